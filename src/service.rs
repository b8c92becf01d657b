//! Service loop
//!
//! Drives the dispatcher from a tokio interval. Every tick services each
//! listener once, then hands ready lines to the interpreter and acks them.

use cncstream_communication::{ConnectionAcceptor, Dispatcher};
use cncstream_core::{AckStatus, MachineControl};
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Upper bound on lines executed in one tick
pub const MAX_LINES_PER_TICK: usize = 32;

/// Executes one line of G-code handed out by a batch channel
pub trait LineInterpreter {
    /// Run `line`; an error aborts the stream it came from
    fn execute(&mut self, line: &str) -> AckStatus;
}

/// Run one cooperative tick. Returns the number of lines executed.
pub fn tick<A, M>(dispatcher: &mut Dispatcher<A>, machine: &mut M) -> usize
where
    A: ConnectionAcceptor,
    M: MachineControl + LineInterpreter,
{
    dispatcher.handle(machine);

    let mut executed = 0;
    while executed < MAX_LINES_PER_TICK {
        let Some((id, line)) = dispatcher.poll_line(machine) else {
            break;
        };
        let status = machine.execute(&line);
        if let Err(e) = &status {
            tracing::warn!("{}: {:?} failed: {}", id, line, e);
        }
        dispatcher.ack(id, status);
        executed += 1;
    }
    executed
}

/// Tick until Ctrl-C, then stop every listener
pub async fn run<A, M>(
    mut dispatcher: Dispatcher<A>,
    machine: &mut M,
    tick_interval: Duration,
) -> anyhow::Result<()>
where
    A: ConnectionAcceptor,
    M: MachineControl + LineInterpreter,
{
    let started = dispatcher.init();
    if started == 0 {
        anyhow::bail!("no server could be started");
    }
    tracing::info!("{} server(s) listening", started);

    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                tick(&mut dispatcher, machine);
            }
            result = &mut shutdown => {
                if let Err(e) = result {
                    tracing::error!("signal handler failed: {}", e);
                }
                tracing::info!("shutting down");
                break;
            }
        }
    }

    dispatcher.stop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::SimulatedMachine;
    use cncstream_communication::{Listener, LoopbackAcceptor, Protocol};
    use cncstream_core::ControllerState;

    fn batch_dispatcher() -> (Dispatcher<LoopbackAcceptor>, cncstream_communication::LoopbackConnector) {
        let acceptor = LoopbackAcceptor::new();
        let connector = acceptor.connector();
        let mut dispatcher = Dispatcher::new();
        dispatcher.add_listener(Listener::new("batch", Protocol::Batch, 81, acceptor));
        assert_eq!(dispatcher.init(), 1);
        (dispatcher, connector)
    }

    fn post(body: &str) -> String {
        format!(
            "POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )
    }

    #[test]
    fn test_tick_executes_posted_lines() {
        let (mut dispatcher, connector) = batch_dispatcher();
        let mut machine = SimulatedMachine::new();
        let peer = connector.connect().unwrap();
        peer.send(post("G0 X5\nG0 Y7\n"));

        let mut executed = 0;
        for _ in 0..10 {
            executed += tick(&mut dispatcher, &mut machine);
        }
        assert_eq!(executed, 2);
        assert_eq!(machine.position().x, 5.0);
        assert_eq!(machine.position().y, 7.0);
        assert!(peer.received_string().starts_with("HTTP/1.1 200 OK"));
    }

    #[test]
    fn test_rejected_line_holds_machine() {
        let (mut dispatcher, connector) = batch_dispatcher();
        let mut machine = SimulatedMachine::new();
        let peer = connector.connect().unwrap();
        peer.send(post("T1\nG0 X5\n"));

        for _ in 0..10 {
            tick(&mut dispatcher, &mut machine);
        }
        assert_eq!(machine.feed_holds(), 1);
        assert_eq!(machine.state(), ControllerState::Hold);
        assert_eq!(machine.position().x, 0.0);
        assert!(peer.is_shut_down());
    }
}
