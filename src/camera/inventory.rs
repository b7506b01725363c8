use std::collections::BTreeMap;

use anyhow::Result;

use super::lens::{DeviceHandle, LensCapabilities, LensDescriptor, LensType};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DevicePosition {
    Back,
    Front,
}

/// One device as reported by the platform enumeration.
#[derive(Clone, Debug)]
pub struct DiscoveredDevice {
    pub handle: DeviceHandle,
    pub position: DevicePosition,
    /// `None` for devices the platform does not categorize (virtual or
    /// multi-lens logical cameras).
    pub lens_type: Option<LensType>,
    pub capabilities: LensCapabilities,
}

/// Platform device enumeration.
pub trait DeviceProvider: Send {
    fn enumerate(&self) -> Result<Vec<DiscoveredDevice>>;

    /// Device the platform would pick for plain video capture, if any.
    fn system_default(&self) -> Option<DiscoveredDevice> {
        None
    }
}

/// Snapshot of the back-facing lenses, keyed by lens type.
#[derive(Clone, Debug, Default)]
pub struct CameraInventory {
    lenses: BTreeMap<LensType, LensDescriptor>,
    system_default: Option<LensDescriptor>,
}

impl CameraInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enumerate back-facing lenses. Absent categories are missing keys;
    /// the first device seen for a category wins.
    pub fn discover(provider: &dyn DeviceProvider) -> Result<Self> {
        let mut inventory = Self::new();
        for device in provider.enumerate()? {
            if device.position != DevicePosition::Back {
                continue;
            }
            let Some(lens_type) = device.lens_type else {
                continue;
            };
            inventory
                .lenses
                .entry(lens_type)
                .or_insert_with(|| LensDescriptor {
                    lens_type,
                    capabilities: device.capabilities,
                    device: device.handle,
                });
        }
        inventory.system_default = provider.system_default().map(|device| LensDescriptor {
            // Uncategorized defaults behave like the main wide lens.
            lens_type: device.lens_type.unwrap_or(LensType::Wide),
            capabilities: device.capabilities,
            device: device.handle,
        });
        log::info!(
            "camera inventory: [{}] system_default={}",
            inventory
                .lens_types()
                .map(|lens| lens.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            inventory
                .system_default
                .as_ref()
                .map(|d| d.device.as_str())
                .unwrap_or("none")
        );
        Ok(inventory)
    }

    pub fn with_lens(mut self, descriptor: LensDescriptor) -> Self {
        self.insert(descriptor);
        self
    }

    pub fn with_system_default(mut self, descriptor: LensDescriptor) -> Self {
        self.system_default = Some(descriptor);
        self
    }

    pub fn insert(&mut self, descriptor: LensDescriptor) {
        self.lenses.insert(descriptor.lens_type, descriptor);
    }

    pub fn get(&self, lens_type: LensType) -> Option<&LensDescriptor> {
        self.lenses.get(&lens_type)
    }

    pub fn contains(&self, lens_type: LensType) -> bool {
        self.lenses.contains_key(&lens_type)
    }

    pub fn system_default(&self) -> Option<&LensDescriptor> {
        self.system_default.as_ref()
    }

    pub fn lens_types(&self) -> impl Iterator<Item = LensType> + '_ {
        self.lenses.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.lenses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lenses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider {
        devices: Vec<DiscoveredDevice>,
        default: Option<DiscoveredDevice>,
    }

    impl DeviceProvider for FixedProvider {
        fn enumerate(&self) -> Result<Vec<DiscoveredDevice>> {
            Ok(self.devices.clone())
        }

        fn system_default(&self) -> Option<DiscoveredDevice> {
            self.default.clone()
        }
    }

    fn device(id: &str, position: DevicePosition, lens: Option<LensType>) -> DiscoveredDevice {
        DiscoveredDevice {
            handle: DeviceHandle::new(id),
            position,
            lens_type: lens,
            capabilities: LensCapabilities::default(),
        }
    }

    #[test]
    fn discover_keeps_back_lenses_only() {
        let provider = FixedProvider {
            devices: vec![
                device("front", DevicePosition::Front, Some(LensType::Wide)),
                device("back-wide", DevicePosition::Back, Some(LensType::Wide)),
                device("back-tele", DevicePosition::Back, Some(LensType::Telephoto)),
                device("back-dual", DevicePosition::Back, None),
                device("back-wide-2", DevicePosition::Back, Some(LensType::Wide)),
            ],
            default: None,
        };
        let inventory = CameraInventory::discover(&provider).unwrap();
        assert_eq!(inventory.len(), 2);
        assert_eq!(inventory.get(LensType::Wide).unwrap().device.as_str(), "back-wide");
        assert!(inventory.contains(LensType::Telephoto));
        assert!(!inventory.contains(LensType::UltraWide));
        assert!(inventory.system_default().is_none());
    }

    #[test]
    fn single_lens_device_has_one_entry() {
        let provider = FixedProvider {
            devices: vec![device("only", DevicePosition::Back, Some(LensType::Wide))],
            default: Some(device("only", DevicePosition::Back, Some(LensType::Wide))),
        };
        let inventory = CameraInventory::discover(&provider).unwrap();
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory.system_default().unwrap().lens_type, LensType::Wide);
    }

    #[test]
    fn uncategorized_default_is_tagged_wide() {
        let provider = FixedProvider {
            devices: vec![],
            default: Some(device("virtual", DevicePosition::Back, None)),
        };
        let inventory = CameraInventory::discover(&provider).unwrap();
        assert!(inventory.is_empty());
        assert_eq!(inventory.system_default().unwrap().lens_type, LensType::Wide);
    }
}
