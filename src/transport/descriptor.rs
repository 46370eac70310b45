//! Port descriptors and the known-plotter compatibility list.

use serde::{Deserialize, Serialize};

/// USB VID/PID pairs known to identify a compatible plotter controller
/// (§6 "Port discovery").
const KNOWN_PLOTTER_IDS: &[(u16, u16, &str)] = &[
    (0x1A86, 0x7523, "CH340"),
    (0x1A86, 0x8040, "CH340K"),
    (0x04D8, 0xFD92, "EiBotBoard"),
];

/// Immutable record describing one physical serial port. Produced by
/// [`crate::transport::enumerate_ports`] and copied to callers; the
/// transport never retains one after returning it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortDescriptor {
    /// OS path or identifier (e.g. `/dev/cu.usbserial-0001`, `COM3`).
    pub path: String,
    /// Human-readable description, if the OS provides one.
    pub description: Option<String>,
    /// USB vendor ID, if exposed by the OS.
    pub vendor_id: Option<u16>,
    /// USB product ID, if exposed by the OS.
    pub product_id: Option<u16>,
    /// Hardware id string, if exposed by the OS (platform-specific format).
    pub hardware_id: Option<String>,
    /// True if (vendor_id, product_id) matches [`KNOWN_PLOTTER_IDS`].
    pub compatible: bool,
}

impl PortDescriptor {
    /// Builds a descriptor, deriving `compatible` from the VID/PID pair.
    pub fn new(
        path: String,
        description: Option<String>,
        vendor_id: Option<u16>,
        product_id: Option<u16>,
        hardware_id: Option<String>,
    ) -> Self {
        let compatible = vendor_id
            .zip(product_id)
            .map(|(v, p)| known_plotter_name(v, p).is_some())
            .unwrap_or(false);
        Self {
            path,
            description,
            vendor_id,
            product_id,
            hardware_id,
            compatible,
        }
    }
}

/// Returns the known device name for a VID/PID pair, if it is in the
/// compatible-plotter list.
pub fn known_plotter_name(vendor_id: u16, product_id: u16) -> Option<&'static str> {
    KNOWN_PLOTTER_IDS
        .iter()
        .find(|(v, p, _)| *v == vendor_id && *p == product_id)
        .map(|(_, _, name)| *name)
}

/// On platforms that expose both a call-in (`/dev/tty.*`) and call-out
/// (`/dev/cu.*`) node for one USB device, keep only the call-out node
/// (§6 "Port discovery").
pub fn dedupe_call_in_nodes(ports: Vec<PortDescriptor>) -> Vec<PortDescriptor> {
    let cu_paths: std::collections::HashSet<String> = ports
        .iter()
        .filter(|p| path_basename(&p.path).starts_with("cu."))
        .map(|p| p.path.replacen("cu.", "tty.", 1))
        .collect();

    ports
        .into_iter()
        .filter(|p| {
            let base = path_basename(&p.path);
            !(base.starts_with("tty.") && cu_paths.contains(&p.path))
        })
        .collect()
}

fn path_basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_plotter_matches_ch340() {
        assert_eq!(known_plotter_name(0x1A86, 0x7523), Some("CH340"));
        assert_eq!(known_plotter_name(0x1A86, 0x8040), Some("CH340K"));
        assert_eq!(known_plotter_name(0x04D8, 0xFD92), Some("EiBotBoard"));
        assert_eq!(known_plotter_name(0x0000, 0x0000), None);
    }

    #[test]
    fn descriptor_marks_compatible_device() {
        let d = PortDescriptor::new(
            "/dev/cu.usbserial-1".into(),
            Some("CH340".into()),
            Some(0x1A86),
            Some(0x7523),
            None,
        );
        assert!(d.compatible);
    }

    #[test]
    fn descriptor_marks_incompatible_device() {
        let d = PortDescriptor::new("/dev/cu.unknown".into(), None, None, None, None);
        assert!(!d.compatible);
    }

    #[test]
    fn dedupe_keeps_call_out_drops_call_in() {
        let ports = vec![
            PortDescriptor::new("/dev/tty.usbserial-1".into(), None, None, None, None),
            PortDescriptor::new("/dev/cu.usbserial-1".into(), None, None, None, None),
            PortDescriptor::new("/dev/cu.usbserial-2".into(), None, None, None, None),
        ];
        let deduped = dedupe_call_in_nodes(ports);
        let paths: Vec<&str> = deduped.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec!["/dev/cu.usbserial-1", "/dev/cu.usbserial-2"]);
    }
}
