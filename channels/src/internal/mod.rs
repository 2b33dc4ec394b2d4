pub(crate) mod ring_buffer;
pub(crate) mod wait_queue;
