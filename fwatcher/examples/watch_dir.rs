// Watches a scratch directory from one coroutine while another one writes to
// it, forwarding decoded events over a rendezvous channel to a printer.
//
//   RUST_LOG=fibre_fwatcher=debug cargo run -p fibre_fwatcher --example watch_dir

use fibre_co::{Channel, Scheduler};
use fibre_fwatcher::{EventMask, OwnedEvent, WaitStatus, WaitStrategy, Watcher, WatcherConfig};

use std::fs;
use std::rc::Rc;
use std::time::Duration;

const FILES: usize = 3;

fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let dir = tempfile::tempdir()?;
  let config = WatcherConfig::new().wait_strategy(WaitStrategy::Cooperative);
  let mut watcher = Watcher::with_config(config)?;
  let entry = watcher.add(dir.path(), EventMask::all())?;
  println!("watching {}", dir.path().display());

  let sched = Scheduler::new();
  let events: Rc<Channel<Option<OwnedEvent>>> = Rc::new(Channel::new(0));

  let tx = events.clone();
  sched.spawn(move |co| async move {
    // Create + modify + delete per file.
    let mut wanted = FILES * 3;
    while wanted > 0 {
      match watcher.wait_in(&co, entry, 1_000).await {
        Ok(WaitStatus::Ready) => {}
        Ok(WaitStatus::TimedOut) => break,
        Err(err) => {
          eprintln!("wait failed: {err}");
          break;
        }
      }
      let owned: Vec<OwnedEvent> = {
        let mut batch = Vec::new();
        match watcher.events(entry, &mut batch, 64) {
          Ok(_) => batch.iter().map(|e| e.to_owned_event()).collect(),
          Err(err) => {
            eprintln!("read failed: {err}");
            break;
          }
        }
      };
      for event in owned {
        wanted = wanted.saturating_sub(1);
        let _ = tx.send(&co, Some(event)).await;
      }
    }
    let _ = tx.send(&co, None).await;
    if let Err(err) = watcher.close() {
      eprintln!("close failed: {err}");
    }
  });

  let root = dir.path().to_path_buf();
  sched.spawn(move |co| async move {
    for i in 0..FILES {
      co.sleep(Duration::from_millis(50)).await;
      let path = root.join(format!("file-{i}.txt"));
      let _ = fs::write(&path, format!("payload {i}"));
      let _ = fs::remove_file(&path);
    }
  });

  let rx = events.clone();
  sched.spawn(move |co| async move {
    while let Ok(Some(event)) = rx.recv(&co).await {
      println!("{:?} {} ({:?})", event.kind, event.path.display(), event.entry);
    }
  });

  let stalled = sched.run();
  println!("done, {stalled} coroutine(s) left parked");
  Ok(())
}
