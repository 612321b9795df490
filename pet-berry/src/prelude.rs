//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::Idx3d;

pub use crate::{DynamicScan, FrameSchedule, VoxelMask, VoxelSpacing};
pub use crate::{FitResult, InputError, InputResult, NumericalError, VoxelError};

pub use crate::consts::{coeff, NUM_COEFFS};

pub use crate::integrate::{integrate_curve, integrate_frames};
pub use crate::reference::{reference_curve, trim_mean, ReferenceCurve};
pub use crate::smooth::{fwhm_to_sigma, gaussian_filter, smooth_channels};

pub use crate::srtm::{PenaltyPolicy, Srtm2, SrtmConfig, SrtmMaps, VoxelFailures};
pub use crate::srtm::synthetic::{Phantom, SrtmParams};
