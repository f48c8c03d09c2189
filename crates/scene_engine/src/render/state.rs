//! Render-state machine values

use bitflags::bitflags;

/// Kind of pass being rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderState {
    /// Shaded geometry into the G-buffer
    #[default]
    GeometryResult,
    /// Geometry voxelization
    GeometryVoxels,
    /// Linear depth (spot and directional shadows)
    DepthLinear,
    /// Cube depth (point shadows)
    DepthCubic,
}

bitflags! {
    /// Pass options combined with a [`RenderState`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RenderOpt: u32 {
        /// Transparent drawables instead of opaque ones
        const TRANSPARENT = 1;
        /// Only static drawables
        const STATIC = 1 << 1;
        /// Additive blending
        const ADDITIVE = 1 << 2;
    }
}

/// State of the pass currently being rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassState {
    /// Pass kind
    pub state: RenderState,
    /// Pass options
    pub options: RenderOpt,
    /// Subpass depth: 0 outside rendering, 1 for the top-level pass
    pub depth: u32,
}

impl PassState {
    /// Whether this is the top-level pass of a frame
    pub fn is_top_level(&self) -> bool {
        self.depth <= 1
    }

    /// Whether the pass draws transparent drawables
    pub fn is_transparent(&self) -> bool {
        self.options.contains(RenderOpt::TRANSPARENT)
    }

    /// Whether the pass is restricted to static drawables
    pub fn is_static(&self) -> bool {
        self.options.contains(RenderOpt::STATIC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_flags() {
        let pass = PassState {
            state: RenderState::DepthLinear,
            options: RenderOpt::TRANSPARENT | RenderOpt::ADDITIVE,
            depth: 2,
        };
        assert!(pass.is_transparent());
        assert!(!pass.is_static());
        assert!(!pass.is_top_level());
        assert!(PassState::default().is_top_level());
    }
}
