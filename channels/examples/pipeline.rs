// A three-stage pipeline: producer -> buffered channel -> squarer -> rendezvous
// channel -> printer, all on one cooperative scheduler.

use fibre_co::{Channel, Scheduler};

use std::rc::Rc;

const ITEMS: u64 = 8;

fn main() {
  let sched = Scheduler::new();
  let numbers = Rc::new(Channel::new(4));
  let squares = Rc::new(Channel::new(0));

  let tx = numbers.clone();
  sched.spawn(move |co| async move {
    for n in 1..=ITEMS {
      println!("[producer] send {n}");
      tx.send(&co, Some(n)).await.unwrap();
    }
    tx.send(&co, None).await.unwrap();
  });

  let (rx, tx) = (numbers.clone(), squares.clone());
  sched.spawn(move |co| async move {
    while let Some(n) = rx.recv(&co).await.unwrap() {
      tx.send(&co, Some(n * n)).await.unwrap();
    }
    tx.send(&co, None).await.unwrap();
  });

  let rx = squares.clone();
  sched.spawn(move |co| async move {
    let mut total = 0;
    while let Some(sq) = rx.recv(&co).await.unwrap() {
      println!("[printer] got {sq}");
      total += sq;
    }
    println!("[printer] sum of squares = {total}");
  });

  let stalled = sched.run();
  assert_eq!(stalled, 0);
}
