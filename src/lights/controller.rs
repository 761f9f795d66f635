use std::fmt;

use serde::Serialize;

use crate::bridge::Bridge;
use crate::error::AppError;
use crate::model::{brightness_percent, LightState};

use super::registry::DeviceRegistry;

/// What a device operation did, phrased for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ControlOutcome {
    Power { name: String, on: bool },
    Brightness { name: String, level: u8, percent: u8 },
    NotFound { name: String },
}

impl ControlOutcome {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ControlOutcome::NotFound { .. })
    }

    /// Turn a not-found outcome into [`AppError::DeviceNotFound`].
    pub fn found(self) -> Result<Self, AppError> {
        match self {
            ControlOutcome::NotFound { name } => Err(AppError::DeviceNotFound { name }),
            other => Ok(other),
        }
    }
}

impl fmt::Display for ControlOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlOutcome::Power { name, on: true } => write!(f, "Turned on {name}"),
            ControlOutcome::Power { name, on: false } => write!(f, "Turned off {name}"),
            ControlOutcome::Brightness { name, percent, .. } => {
                write!(f, "Set {name} to {percent}% brightness")
            }
            ControlOutcome::NotFound { name } => write!(f, "Light not found: {name}"),
        }
    }
}

/// Executes power and brightness changes against registry names.
///
/// Every light id behind a name gets its own bridge call, in registry order.
/// The first failing call aborts the operation; lights already switched stay
/// switched.
pub struct DeviceController<B> {
    registry: DeviceRegistry,
    bridge: B,
}

impl<B: Bridge> DeviceController<B> {
    pub fn new(registry: DeviceRegistry, bridge: B) -> Self {
        Self { registry, bridge }
    }

    /// Fetch the bridge inventory and build the registry from it.
    pub async fn discover(bridge: B) -> Result<Self, AppError> {
        let inventory = bridge.inventory().await?;
        let registry = DeviceRegistry::from_inventory(&inventory);
        tracing::info!(
            lights = inventory.lights.len(),
            groups = inventory.groups.len(),
            names = registry.len(),
            "device registry built"
        );
        Ok(Self::new(registry, bridge))
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    pub async fn set_power(&self, name: &str, on: bool) -> Result<ControlOutcome, AppError> {
        if !self.apply(name, LightState::power(on)).await? {
            return Ok(not_found(name));
        }
        tracing::info!(name, on, "power set");
        Ok(ControlOutcome::Power {
            name: name.to_string(),
            on,
        })
    }

    pub async fn set_brightness(&self, name: &str, level: u8) -> Result<ControlOutcome, AppError> {
        if !self.apply(name, LightState::brightness(level)).await? {
            return Ok(not_found(name));
        }
        let percent = brightness_percent(level);
        tracing::info!(name, level, percent, "brightness set");
        Ok(ControlOutcome::Brightness {
            name: name.to_string(),
            level,
            percent,
        })
    }

    /// Returns false when `name` is not addressable; no bridge call is made then.
    async fn apply(&self, name: &str, state: LightState) -> Result<bool, AppError> {
        let Some(ids) = self.registry.resolve(name) else {
            return Ok(false);
        };
        for id in ids {
            self.bridge.set_state(id, &state).await?;
        }
        Ok(true)
    }
}

fn not_found(name: &str) -> ControlOutcome {
    tracing::warn!(name, "light not found");
    ControlOutcome::NotFound {
        name: name.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::model::{BridgeInventory, LightId};

    /// In-memory bridge that records every state call.
    #[derive(Default)]
    pub(crate) struct FakeBridge {
        pub inventory: BridgeInventory,
        pub calls: Mutex<Vec<(LightId, LightState)>>,
        /// Fail the call for this light id.
        pub fail_on: Option<LightId>,
    }

    impl FakeBridge {
        pub fn with_inventory(inventory: BridgeInventory) -> Self {
            Self {
                inventory,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<(LightId, LightState)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Bridge for FakeBridge {
        async fn inventory(&self) -> Result<BridgeInventory, AppError> {
            Ok(self.inventory.clone())
        }

        async fn set_state(&self, id: &LightId, state: &LightState) -> Result<(), AppError> {
            if self.fail_on.as_ref() == Some(id) {
                return Err(AppError::bridge("device is unreachable"));
            }
            self.calls.lock().unwrap().push((id.clone(), *state));
            Ok(())
        }
    }

    pub(crate) fn sample_inventory() -> BridgeInventory {
        BridgeInventory::default()
            .with_light("3", "Lamp")
            .with_light("4", "Lamp 2")
            .with_light("7", "Office")
            .with_group("1", "Lamp Group", &["3", "4"])
    }

    async fn controller(bridge: FakeBridge) -> DeviceController<FakeBridge> {
        DeviceController::discover(bridge).await.unwrap()
    }

    #[tokio::test]
    async fn discover_builds_registry_from_inventory() {
        let ctl = controller(FakeBridge::with_inventory(sample_inventory())).await;
        assert!(ctl.registry().contains("Lamp Group"));
        assert!(!ctl.registry().contains("Lamp"));
    }

    #[tokio::test]
    async fn power_on_single_light() {
        let ctl = controller(FakeBridge::with_inventory(sample_inventory())).await;
        let outcome = ctl.set_power("Office", true).await.unwrap();

        assert_eq!(
            outcome,
            ControlOutcome::Power {
                name: "Office".to_string(),
                on: true
            }
        );
        assert_eq!(outcome.to_string(), "Turned on Office");
        assert_eq!(ctl.bridge().calls(), vec![(LightId::from("7"), LightState::power(true))]);
    }

    #[tokio::test]
    async fn power_off_group_calls_every_member_in_order() {
        let ctl = controller(FakeBridge::with_inventory(sample_inventory())).await;
        let outcome = ctl.set_power("Lamp Group", false).await.unwrap();

        assert_eq!(outcome.to_string(), "Turned off Lamp Group");
        assert_eq!(
            ctl.bridge().calls(),
            vec![
                (LightId::from("3"), LightState::power(false)),
                (LightId::from("4"), LightState::power(false)),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_name_is_not_found_without_bridge_calls() {
        let ctl = controller(FakeBridge::with_inventory(sample_inventory())).await;

        let power = ctl.set_power("Nonexistent", true).await.unwrap();
        let bright = ctl.set_brightness("Nonexistent", 100).await.unwrap();

        assert!(power.is_not_found());
        assert!(bright.is_not_found());
        assert_eq!(power.to_string(), "Light not found: Nonexistent");
        assert!(matches!(power.found(), Err(AppError::DeviceNotFound { ref name }) if name == "Nonexistent"));
        assert!(ctl.bridge().calls().is_empty());
    }

    #[tokio::test]
    async fn subsumed_light_name_is_not_found() {
        let ctl = controller(FakeBridge::with_inventory(sample_inventory())).await;
        assert!(ctl.set_power("Lamp", true).await.unwrap().is_not_found());
    }

    #[tokio::test]
    async fn empty_group_is_not_found() {
        let inventory = sample_inventory().with_group("9", "Garage", &[]);
        let ctl = controller(FakeBridge::with_inventory(inventory)).await;

        assert!(ctl.set_power("Garage", true).await.unwrap().is_not_found());
        assert!(ctl.bridge().calls().is_empty());
    }

    #[tokio::test]
    async fn brightness_reports_percentage() {
        let ctl = controller(FakeBridge::with_inventory(sample_inventory())).await;

        for (level, expected) in [(254, 100), (0, 0), (127, 50)] {
            let outcome = ctl.set_brightness("Office", level).await.unwrap();
            assert_eq!(
                outcome,
                ControlOutcome::Brightness {
                    name: "Office".to_string(),
                    level,
                    percent: expected
                }
            );
        }
        assert_eq!(
            ctl.set_brightness("Office", 127).await.unwrap().to_string(),
            "Set Office to 50% brightness"
        );
    }

    #[tokio::test]
    async fn brightness_turns_lights_on() {
        let ctl = controller(FakeBridge::with_inventory(sample_inventory())).await;
        ctl.set_brightness("Lamp Group", 200).await.unwrap();

        let calls = ctl.bridge().calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(_, s)| *s == LightState::brightness(200)));
    }

    #[tokio::test]
    async fn first_bridge_failure_aborts_group_operation() {
        let bridge = FakeBridge {
            inventory: sample_inventory(),
            fail_on: Some(LightId::from("4")),
            ..FakeBridge::default()
        };
        let ctl = controller(bridge).await;

        let err = ctl.set_power("Lamp Group", true).await.unwrap_err();
        assert!(matches!(err, AppError::Bridge { .. }));
        // The member before the failing one was already switched
        assert_eq!(ctl.bridge().calls(), vec![(LightId::from("3"), LightState::power(true))]);
    }
}
