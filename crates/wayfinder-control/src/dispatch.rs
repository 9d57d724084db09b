use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use wayfinder_navigation::Trajectory;

use crate::motor::{MotorCommand, MotorHub};
use crate::steering::SteeringController;

/// Clears the in-flight flag when the send task ends, even by panic or abort.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Sends motor commands with at most one send outstanding.
#[derive(Debug)]
pub struct Dispatcher<H> {
    hub: Arc<H>,
    in_flight: Arc<AtomicBool>,
}

impl<H> Clone for Dispatcher<H> {
    fn clone(&self) -> Self {
        Dispatcher { hub: Arc::clone(&self.hub), in_flight: Arc::clone(&self.in_flight) }
    }
}

impl<H: MotorHub> Dispatcher<H> {
    /// Creates a dispatcher over `hub`.
    pub fn new(hub: Arc<H>) -> Self {
        Dispatcher { hub, in_flight: Arc::new(AtomicBool::new(false)) }
    }

    /// Starts sending `command` unless a previous send is still in flight.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Returns
    /// `true` if the send was started, `false` if it was skipped.
    pub fn try_dispatch(&self, command: MotorCommand) -> bool {
        if self.in_flight.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return false;
        }

        let hub = Arc::clone(&self.hub);
        let guard = InFlight(Arc::clone(&self.in_flight));
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = hub.send(command).await {
                warn!(%command, error = %e, "Motor command failed.");
            }
        });
        true
    }

    /// Whether a send is outstanding.
    pub fn in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// The underlying hub.
    pub fn hub(&self) -> &Arc<H> {
        &self.hub
    }
}

/// Sends the latest motor command on a fixed period.
///
/// Ticks that find a send in flight are skipped. The task ends when the
/// command sender is dropped.
pub async fn run_dispatch_task<H: MotorHub>(
    dispatcher: Dispatcher<H>,
    command_rx: watch::Receiver<MotorCommand>,
    period: Duration,
) -> anyhow::Result<()> {
    info!("Dispatch task started.");
    let mut tick = tokio::time::interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tick.tick().await;
        if command_rx.has_changed().is_err() {
            break;
        }
        let command = *command_rx.borrow();
        if !dispatcher.try_dispatch(command) {
            debug!(%command, "Send in flight, skipping tick.");
        }
    }
    info!("Command source closed, dispatch task stopping.");
    Ok(())
}

/// Re-evaluates the steering controller on every trajectory and enable change.
///
/// The resulting command is published immediately. When the trajectory source
/// closes the controller is disabled and a final `Stop` is published.
pub async fn run_steering_task(
    mut controller: SteeringController,
    mut trajectory_rx: watch::Receiver<Option<Trajectory>>,
    mut enabled_rx: watch::Receiver<bool>,
    command_tx: watch::Sender<MotorCommand>,
) -> anyhow::Result<()> {
    info!("Steering task started.");
    let enabled = *enabled_rx.borrow_and_update();
    command_tx.send_replace(controller.set_enabled(enabled));

    let mut enable_open = true;
    loop {
        let command = tokio::select! {
            changed = trajectory_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let trajectory = *trajectory_rx.borrow_and_update();
                controller.update(trajectory)
            }
            changed = enabled_rx.changed(), if enable_open => {
                if changed.is_err() {
                    enable_open = false;
                    continue;
                }
                let enabled = *enabled_rx.borrow_and_update();
                controller.set_enabled(enabled)
            }
        };
        debug!(%command, state = %controller.state(), "Steering updated.");
        command_tx.send_replace(command);
    }

    command_tx.send_replace(controller.set_enabled(false));
    info!("Trajectory source closed, steering task stopping.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::{MotorPort, WheelSpeeds};
    use crate::steering::SteeringConfig;
    use core::fmt;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// Hub whose sends complete only when the gate is opened.
    #[derive(Default)]
    struct GatedHub {
        gate: Notify,
        sent: Mutex<Vec<MotorCommand>>,
        completed: AtomicUsize,
    }

    #[derive(Debug)]
    struct Never;

    impl fmt::Display for Never {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("never")
        }
    }

    impl MotorHub for GatedHub {
        type Error = Never;

        async fn send(&self, command: MotorCommand) -> Result<(), Never> {
            self.sent.lock().unwrap().push(command);
            self.gate.notified().await;
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Hub whose sends panic.
    struct PanickingHub;

    impl MotorHub for PanickingHub {
        type Error = Never;

        async fn send(&self, command: MotorCommand) -> Result<(), Never> {
            panic!("hub link lost while sending {command}");
        }
    }

    fn drive(left: f32, right: f32) -> MotorCommand {
        MotorCommand::drive(MotorPort::A, MotorPort::E, WheelSpeeds::new(left, right))
    }

    async fn settle(dispatcher: &Dispatcher<GatedHub>) {
        while dispatcher.in_flight() {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_second_dispatch_skipped_while_in_flight() {
        let hub = Arc::new(GatedHub::default());
        let dispatcher = Dispatcher::new(Arc::clone(&hub));

        assert!(dispatcher.try_dispatch(drive(30.0, 30.0)));
        assert!(dispatcher.in_flight());
        assert!(!dispatcher.try_dispatch(drive(10.0, 10.0)));

        hub.gate.notify_one();
        tokio::time::timeout(Duration::from_secs(5), settle(&dispatcher)).await.unwrap();
        assert_eq!(hub.completed.load(Ordering::SeqCst), 1);

        assert_eq!(*hub.sent.lock().unwrap(), vec![drive(30.0, 30.0)]);
        assert!(dispatcher.try_dispatch(drive(10.0, 10.0)));
        assert!(dispatcher.in_flight());
    }

    #[tokio::test]
    async fn test_panicked_send_releases_in_flight() {
        let dispatcher = Dispatcher::new(Arc::new(PanickingHub));
        let stop = MotorCommand::stop(MotorPort::A, MotorPort::E);

        assert!(dispatcher.try_dispatch(stop));
        tokio::time::timeout(Duration::from_secs(5), async {
            while dispatcher.in_flight() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert!(dispatcher.try_dispatch(stop));
    }

    #[test]
    fn test_aborted_send_releases_in_flight() {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
        let dispatcher = Dispatcher::new(Arc::new(GatedHub::default()));
        runtime.block_on(async {
            assert!(dispatcher.try_dispatch(drive(30.0, 30.0)));
            tokio::task::yield_now().await;
        });
        assert!(dispatcher.in_flight());

        // Shutting the runtime down drops the blocked send task.
        drop(runtime);
        assert!(!dispatcher.in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_task_skips_ticks() {
        let hub = Arc::new(GatedHub::default());
        let dispatcher = Dispatcher::new(Arc::clone(&hub));
        let (command_tx, command_rx) = watch::channel(MotorCommand::stop(MotorPort::A, MotorPort::E));
        let task = tokio::spawn(run_dispatch_task(dispatcher.clone(), command_rx, Duration::from_millis(100)));

        // Five ticks elapse while the first send is blocked.
        tokio::time::sleep(Duration::from_millis(450)).await;
        assert_eq!(hub.sent.lock().unwrap().len(), 1);

        command_tx.send_replace(drive(20.0, 20.0));
        hub.gate.notify_one();
        tokio::time::sleep(Duration::from_millis(100)).await;
        {
            let sent = hub.sent.lock().unwrap();
            assert_eq!(sent.len(), 2);
            assert_eq!(sent[1], drive(20.0, 20.0));
        }

        hub.gate.notify_one();
        drop(command_tx);
        tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap().unwrap();
    }

    async fn wait_for(command_rx: &mut watch::Receiver<MotorCommand>, predicate: fn(&MotorCommand) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !predicate(&command_rx.borrow_and_update()) {
                command_rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_steering_task_follows_trajectory_and_enable() {
        let (trajectory_tx, trajectory_rx) = watch::channel(None);
        let (enabled_tx, enabled_rx) = watch::channel(false);
        let (command_tx, mut command_rx) = watch::channel(MotorCommand::stop(MotorPort::A, MotorPort::E));
        let controller = SteeringController::new(SteeringConfig::default());
        let task = tokio::spawn(run_steering_task(controller, trajectory_rx, enabled_rx, command_tx));

        trajectory_tx.send_replace(Some(Trajectory::new(0.0, 2.0)));
        enabled_tx.send_replace(true);
        wait_for(&mut command_rx, |c| *c == drive(30.0, 30.0)).await;

        enabled_tx.send_replace(false);
        wait_for(&mut command_rx, MotorCommand::is_stop).await;

        enabled_tx.send_replace(true);
        wait_for(&mut command_rx, |c| !c.is_stop()).await;

        drop(trajectory_tx);
        tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
        assert!(command_rx.borrow().is_stop());
    }
}
