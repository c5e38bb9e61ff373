// SPDX-License-Identifier: GPL-3.0-only

//! Camera constraint options and fallback chains

use super::types::FacingMode;
use crate::constants::camera as defaults;
use serde::{Deserialize, Serialize};

/// How strictly a facing mode must be honoured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingConstraint {
    /// Fail if no camera with this facing exists
    Exact(FacingMode),
    /// Prefer this facing, accept any camera otherwise
    Ideal(FacingMode),
}

impl FacingConstraint {
    pub fn facing(&self) -> FacingMode {
        match self {
            FacingConstraint::Exact(f) | FacingConstraint::Ideal(f) => *f,
        }
    }
}

/// One candidate set of camera constraints
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintOption {
    pub facing: Option<FacingConstraint>,
    /// Exact device id, overrides facing when set
    pub device_id: Option<String>,
    /// Ideal resolution
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Ideal frame rate
    pub frame_rate: Option<u32>,
}

impl ConstraintOption {
    /// `video: true`, any camera
    pub fn unconstrained() -> Self {
        Self::default()
    }

    pub fn exact(facing: FacingMode) -> Self {
        Self {
            facing: Some(FacingConstraint::Exact(facing)),
            ..Self::default()
        }
    }

    pub fn ideal(facing: FacingMode) -> Self {
        Self {
            facing: Some(FacingConstraint::Ideal(facing)),
            ..Self::default()
        }
    }

    pub fn device(id: impl Into<String>) -> Self {
        Self {
            device_id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_frame_rate(mut self, fps: u32) -> Self {
        self.frame_rate = Some(fps);
        self
    }

    pub fn is_unconstrained(&self) -> bool {
        self.facing.is_none() && self.device_id.is_none()
    }
}

impl std::fmt::Display for ConstraintOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.device_id, &self.facing) {
            (Some(id), _) => write!(f, "device={}", id)?,
            (None, Some(FacingConstraint::Exact(facing))) => write!(f, "exact {}", facing)?,
            (None, Some(FacingConstraint::Ideal(facing))) => write!(f, "ideal {}", facing)?,
            (None, None) => write!(f, "any camera")?,
        }
        if let (Some(w), Some(h)) = (self.width, self.height) {
            write!(f, " {}x{}", w, h)?;
        }
        if let Some(fps) = self.frame_rate {
            write!(f, " @{}fps", fps)?;
        }
        Ok(())
    }
}

/// Default fallback order for a preferred facing
///
/// Exact preferred camera at the preferred resolution, then the preferred
/// camera as a hint, then the opposite camera, then anything at all.
pub fn fallback_chain(preferred: FacingMode) -> Vec<ConstraintOption> {
    vec![
        ConstraintOption::exact(preferred)
            .with_resolution(defaults::PREFERRED_WIDTH, defaults::PREFERRED_HEIGHT)
            .with_frame_rate(defaults::PREFERRED_FRAME_RATE),
        ConstraintOption::ideal(preferred),
        ConstraintOption::ideal(preferred.opposite()),
        ConstraintOption::unconstrained(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_chain_ends_unconstrained() {
        let chain = fallback_chain(FacingMode::Environment);
        assert_eq!(chain.len(), 4);
        assert_eq!(
            chain[0].facing,
            Some(FacingConstraint::Exact(FacingMode::Environment))
        );
        assert_eq!(chain[2].facing, Some(FacingConstraint::Ideal(FacingMode::User)));
        assert!(chain[3].is_unconstrained());
    }

    #[test]
    fn display_describes_constraint() {
        let option = ConstraintOption::exact(FacingMode::User)
            .with_resolution(640, 480)
            .with_frame_rate(15);
        assert_eq!(option.to_string(), "exact user 640x480 @15fps");
        assert_eq!(ConstraintOption::unconstrained().to_string(), "any camera");
    }
}
