use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

use super::interface::InterfaceEvent;
use crate::codec::EntityId;
use crate::entity::SharedEntityInfo;
use crate::error::Result;
use crate::mailbox::{Mailbox, Next};

/// Requests for the advertising timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertiseEvent {
    /// Announce now instead of waiting for the next cycle.
    Advertise,
}

/// Advertising entity state machine (IEEE 1722.1-2021, 6.2.4.2).
///
/// Owns the announce schedule only. Frames are sent by the interface
/// loops it signals.
pub struct AdvertisingEntityStateMachine {
    info: SharedEntityInfo,
    interfaces: Vec<Arc<Mailbox<InterfaceEvent>>>,
    rng: StdRng,
}

impl AdvertisingEntityStateMachine {
    /// The delay generator is seeded from the entity id and the current
    /// time, so two entities booting together draw different delays.
    pub fn new(info: SharedEntityInfo, interfaces: Vec<Arc<Mailbox<InterfaceEvent>>>) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_nanos() as u64);
        let seed = info.read().entity_id.wrapping_add(nanos);
        Self {
            info,
            interfaces,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Delay before the first announcement of a cycle, uniform in
    /// `[0, valid_time / 5)` seconds. Spreads out entities that power up
    /// together.
    pub fn random_device_delay(&mut self) -> Duration {
        let valid_time = f64::from(self.info.read().valid_time);
        Duration::from_secs_f64(self.rng.random::<f64>() * valid_time / 5.0)
    }

    /// Wait between announcements.
    pub fn reannounce_interval(&self) -> Duration {
        Duration::from_secs(u64::from((self.info.read().valid_time / 2).max(1)))
    }

    /// Ask every interface loop to send ENTITY_AVAILABLE.
    pub fn send_available(&self) {
        for interface in &self.interfaces {
            interface.post(InterfaceEvent::Advertise);
        }
    }

    /// Run the timer on its own thread until `mailbox` is terminated.
    pub fn spawn(self, mailbox: Arc<Mailbox<AdvertiseEvent>>) -> Result<JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name("adp-advertise".to_string())
            .spawn(move || self.run(&mailbox))?;
        Ok(handle)
    }

    fn run(mut self, mailbox: &Mailbox<AdvertiseEvent>) {
        let entity_id = {
            let mut info = self.info.write();
            info.available_index = 0;
            info.entity_id
        };
        tracing::info!(entity_id = %EntityId(entity_id), "advertising started");

        'cycle: loop {
            // An advertise request cuts the delay short.
            if let Next::Terminate = mailbox.recv_timeout(self.random_device_delay()) {
                break;
            }
            loop {
                self.send_available();
                match mailbox.recv_timeout(self.reannounce_interval()) {
                    // Announce at once and restart the interval.
                    Next::Event(AdvertiseEvent::Advertise) => {}
                    Next::Timeout => continue 'cycle,
                    Next::Terminate => break 'cycle,
                }
            }
        }
        tracing::info!(entity_id = %EntityId(entity_id), "advertising stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::entity::{EntityInfo, shared};

    fn machine(
        valid_time: u32,
        interfaces: Vec<Arc<Mailbox<InterfaceEvent>>>,
    ) -> AdvertisingEntityStateMachine {
        let info = EntityInfo {
            valid_time,
            ..EntityInfo::new(42)
        };
        AdvertisingEntityStateMachine::new(shared(info), interfaces)
    }

    #[test]
    fn random_delay_stays_below_a_fifth_of_valid_time() {
        let mut timer = machine(62, Vec::new());
        for _ in 0..50 {
            assert!(timer.random_device_delay() < Duration::from_secs_f64(62.0 / 5.0));
        }
    }

    #[test]
    fn reannounce_is_half_valid_time_at_least_one_second() {
        assert_eq!(machine(62, Vec::new()).reannounce_interval(), Duration::from_secs(31));
        assert_eq!(machine(1, Vec::new()).reannounce_interval(), Duration::from_secs(1));
    }

    #[test]
    fn send_available_signals_every_interface() {
        let interfaces = vec![Arc::new(Mailbox::new()), Arc::new(Mailbox::new())];
        machine(62, interfaces.clone()).send_available();
        for interface in interfaces {
            assert_eq!(interface.try_recv(), Some(InterfaceEvent::Advertise));
        }
    }

    #[test]
    fn start_resets_available_index_and_terminates() {
        let info = shared(EntityInfo {
            valid_time: 2,
            available_index: 7,
            ..EntityInfo::new(42)
        });
        let interface = Arc::new(Mailbox::new());
        let timer = AdvertisingEntityStateMachine::new(info.clone(), vec![interface.clone()]);
        let mailbox = Arc::new(Mailbox::new());
        mailbox.post(AdvertiseEvent::Advertise);
        let handle = timer.spawn(mailbox.clone()).unwrap();

        // The queued request skips the random delay.
        assert!(signalled_within(&interface, Duration::from_secs(5)));
        assert_eq!(info.read().available_index, 0);

        mailbox.terminate();
        handle.join().unwrap();
    }

    #[test]
    fn request_during_reannounce_wait_signals_at_once() {
        let interface = Arc::new(Mailbox::new());
        let timer = machine(62, vec![interface.clone()]);
        let mailbox = Arc::new(Mailbox::new());
        mailbox.post(AdvertiseEvent::Advertise);
        let handle = timer.spawn(mailbox.clone()).unwrap();
        assert!(signalled_within(&interface, Duration::from_secs(5)));

        // Now inside the 31 s re-announce wait.
        thread::sleep(Duration::from_millis(50));
        mailbox.post(AdvertiseEvent::Advertise);
        assert!(signalled_within(&interface, Duration::from_millis(500)));

        mailbox.post(AdvertiseEvent::Advertise);
        assert!(signalled_within(&interface, Duration::from_millis(500)));

        mailbox.terminate();
        handle.join().unwrap();
    }

    /// Take one advertise signal, waiting at most `timeout` for it.
    fn signalled_within(interface: &Mailbox<InterfaceEvent>, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Some(InterfaceEvent::Advertise) = interface.try_recv() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }
}
