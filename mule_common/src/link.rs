//! SPSC command/status rings between the control tick and the host
//! context.
//!
//! The control core is single-threaded; the only other context is the
//! long-execution host I/O side. The two talk exclusively through these
//! two lock-free single-producer/single-consumer rings: commands flow
//! toward the tick, status snapshots flow away from it. The tick drains
//! the command ring at the start of its dispatch step and never blocks;
//! when the status ring is full the oldest snapshot is simply not
//! replaced (the supervisor reads a slightly older state).
//!
//! The queues hold one element less than their declared capacity, so the
//! capacities in [`crate::consts`] are sized one above the intended depth.

use heapless::spsc::{Consumer, Producer, Queue};

use crate::consts::{COMMAND_RING_CAPACITY, STATUS_RING_CAPACITY};
use crate::msg::{Command, Status};

/// Ring carrying supervisor commands toward the control tick.
pub type CommandRing = Queue<Command, COMMAND_RING_CAPACITY>;
/// Host-side end of the command ring.
pub type CommandProducer<'a> = Producer<'a, Command, COMMAND_RING_CAPACITY>;
/// Tick-side end of the command ring.
pub type CommandConsumer<'a> = Consumer<'a, Command, COMMAND_RING_CAPACITY>;

/// Ring carrying status snapshots away from the control tick.
pub type StatusRing = Queue<Status, STATUS_RING_CAPACITY>;
/// Tick-side end of the status ring.
pub type StatusProducer<'a> = Producer<'a, Status, STATUS_RING_CAPACITY>;
/// Host-side end of the status ring.
pub type StatusConsumer<'a> = Consumer<'a, Status, STATUS_RING_CAPACITY>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msg::Command;

    #[test]
    fn command_ring_is_fifo() {
        let mut ring = CommandRing::new();
        let (mut tx, mut rx) = ring.split();
        tx.enqueue(Command::StartPath).unwrap();
        tx.enqueue(Command::ClearPath).unwrap();
        assert_eq!(rx.dequeue(), Some(Command::StartPath));
        assert_eq!(rx.dequeue(), Some(Command::ClearPath));
        assert_eq!(rx.dequeue(), None);
    }

    #[test]
    fn command_ring_rejects_overflow() {
        let mut ring = CommandRing::new();
        let (mut tx, _rx) = ring.split();
        for _ in 0..COMMAND_RING_CAPACITY - 1 {
            tx.enqueue(Command::Reset).unwrap();
        }
        assert!(tx.enqueue(Command::Reset).is_err());
    }
}
