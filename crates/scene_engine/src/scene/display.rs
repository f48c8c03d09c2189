//! Display render targets
//!
//! Every scene renders into a G-buffer and an output target sized from the
//! output resolution scaled by the render quality.

use crate::render::{RenderDevice, TargetDesc, TargetFormat, TargetHandle};

/// G-buffer attachment holding diffuse color
pub const ATTACHMENT_DIFFUSE: usize = 0;
/// G-buffer attachment holding view-space normals
pub const ATTACHMENT_NORMAL: usize = 1;
/// G-buffer attachment holding linear depth
pub const ATTACHMENT_DEPTH: usize = 2;
/// G-buffer attachment holding material ids and parameters
pub const ATTACHMENT_MATERIAL: usize = 3;

const GBUFFER_FORMATS: [TargetFormat; 4] = [
    TargetFormat::Rgba8,
    TargetFormat::Rgba16F,
    TargetFormat::R32F,
    TargetFormat::Rgba8,
];

/// Clear values per G-buffer attachment; linear depth clears to "far"
const GBUFFER_CLEAR: [[f32; 4]; 4] = [
    [0.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 0.0, 0.0, 0.0],
];

const OUTPUT_CLEAR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Scale a resolution by the render quality, never below one pixel
pub fn scaled_size(width: u32, height: u32, quality: f32) -> (u32, u32) {
    let scale = |value: u32| ((value as f32 * quality).round() as u32).max(1);
    (scale(width), scale(height))
}

/// G-buffer plus output target of one scene
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayTargets {
    gbuffer: TargetHandle,
    output: TargetHandle,
    width: u32,
    height: u32,
}

impl DisplayTargets {
    /// Create both targets; `None` (logged) when either creation fails
    pub fn create(device: &dyn RenderDevice, width: u32, height: u32, quality: f32) -> Option<Self> {
        let (width, height) = scaled_size(width, height, quality);

        let gbuffer = device
            .create_target(&TargetDesc {
                width,
                height,
                color: GBUFFER_FORMATS.to_vec(),
                depth: true,
            })
            .map_err(|e| log::error!("Failed to create G-buffer: {e}"))
            .ok()?;

        let output = match device.create_target(&TargetDesc {
            width,
            height,
            color: vec![TargetFormat::Rgba8],
            depth: false,
        }) {
            Ok(output) => output,
            Err(e) => {
                log::error!("Failed to create output target: {e}");
                device.destroy_target(gbuffer);
                return None;
            }
        };

        log::debug!("Created display targets {width}x{height}");
        Some(Self {
            gbuffer,
            output,
            width,
            height,
        })
    }

    /// Destroy both targets
    pub fn destroy(self, device: &dyn RenderDevice) {
        device.destroy_target(self.gbuffer);
        device.destroy_target(self.output);
    }

    /// Clear the G-buffer (depth to 1.0) and the output target
    pub fn clear(&self, device: &dyn RenderDevice) {
        device.clear_target(self.output, &[OUTPUT_CLEAR], None);
        device.clear_target(self.gbuffer, &GBUFFER_CLEAR, Some(1.0));
    }

    /// Size in pixels
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Multi-attachment G-buffer target
    pub fn gbuffer(&self) -> TargetHandle {
        self.gbuffer
    }

    /// Single-attachment output target
    pub fn output(&self) -> TargetHandle {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{HeadlessDevice, ResourceKind};

    #[test]
    fn test_size_follows_quality() {
        assert_eq!(scaled_size(1280, 720, 0.5), (640, 360));
        assert_eq!(scaled_size(1280, 720, 1.5), (1920, 1080));
        assert_eq!(scaled_size(3, 3, 0.01), (1, 1));
    }

    #[test]
    fn test_attachment_layout() {
        let device = HeadlessDevice::new();
        let targets = DisplayTargets::create(&device, 800, 600, 1.0).unwrap();

        let gbuffer = device.target(targets.gbuffer()).unwrap();
        assert_eq!(gbuffer.color.len(), 4);
        assert_eq!(gbuffer.color[ATTACHMENT_DEPTH], TargetFormat::R32F);
        assert_eq!(gbuffer.color[ATTACHMENT_NORMAL], TargetFormat::Rgba16F);
        assert!(gbuffer.depth);
        assert_eq!(device.target(targets.output()).unwrap().color, vec![TargetFormat::Rgba8]);

        targets.clear(&device);
        let (cleared, colors, depth) = device.last_clear().unwrap();
        assert_eq!(cleared, targets.gbuffer());
        assert_eq!(colors[ATTACHMENT_DEPTH][0], 1.0);
        assert_eq!(depth, Some(1.0));

        targets.destroy(&device);
        assert_eq!(device.live_targets(), 0);
    }

    #[test]
    fn test_creation_failure_returns_none() {
        let device = HeadlessDevice::new();
        device.fail_next(ResourceKind::Target);
        assert!(DisplayTargets::create(&device, 800, 600, 1.0).is_none());
        assert_eq!(device.live_targets(), 0);
    }
}
