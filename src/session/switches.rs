//! Digital output switches (the LEDs).

use crate::devices::traits::PinDriver;
use crate::error::{MonitorError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

struct Switches {
    states: BTreeMap<String, (u8, bool)>,
    driver: Box<dyn PinDriver>,
}

/// Fixed set of named on/off outputs.
///
/// The id set is decided at construction; toggling an unknown id is an error
/// and leaves every state untouched.
#[derive(Clone)]
pub struct SwitchRegistry {
    inner: Arc<Mutex<Switches>>,
}

impl SwitchRegistry {
    /// Configure every pin as an output, driven low.
    ///
    /// A pin that fails to configure is logged and kept in the set; its
    /// logical state is still tracked.
    pub fn new(pins: &BTreeMap<String, u8>, mut driver: Box<dyn PinDriver>) -> Self {
        let mut states = BTreeMap::new();
        for (id, &pin) in pins {
            if let Err(e) = driver.setup_output(pin) {
                error!(switch = %id, pin, "Failed to configure pin: {}", e);
            }
            states.insert(id.clone(), (pin, false));
        }
        info!(switches = states.len(), "Switch registry ready");

        Self {
            inner: Arc::new(Mutex::new(Switches { states, driver })),
        }
    }

    /// Flip a switch and return its new state.
    pub async fn toggle(&self, id: &str) -> Result<bool> {
        let mut guard = self.inner.lock().await;
        let switches = &mut *guard;
        let (pin, state) = switches
            .states
            .get_mut(id)
            .ok_or_else(|| MonitorError::unknown_switch(id))?;

        *state = !*state;
        let new_state = *state;
        if let Err(e) = switches.driver.write(*pin, new_state) {
            error!(switch = %id, pin = *pin, "Failed to drive pin: {}", e);
        }
        info!(switch = %id, state = new_state, "Switch toggled");
        Ok(new_state)
    }

    /// Current state of every switch.
    pub async fn states(&self) -> BTreeMap<String, bool> {
        self.inner
            .lock()
            .await
            .states
            .iter()
            .map(|(id, (_, state))| (id.clone(), *state))
            .collect()
    }

    /// Drive every pin low.
    pub async fn all_off(&self) {
        let mut guard = self.inner.lock().await;
        let switches = &mut *guard;
        for (id, (pin, state)) in switches.states.iter_mut() {
            *state = false;
            if let Err(e) = switches.driver.write(*pin, false) {
                error!(switch = %id, pin = *pin, "Failed to drive pin: {}", e);
            }
        }
    }
}
