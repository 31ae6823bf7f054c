//! Fractal-deformed lattice renderer core.
//!
//! The host owns the frame loop and a [`GpuDevice`](api::GpuDevice); this
//! crate plans the grid, owns the deformation buffers and programs, runs the
//! three deformation passes and issues one draw set per segment.

pub mod api;
pub mod config;
pub mod error;
pub mod mesh;
pub mod overlay;
pub mod pipeline;
pub mod plan;
pub mod pool;
pub mod recording;
pub mod sampling;

pub use api::{Backend, GpuDevice, GpuError};
pub use config::{LatticeConfig, NoiseDepth};
pub use error::{LatticeError, Result};
pub use mesh::{BulkMesh, MeshTemplate, TileGeometry};
pub use pipeline::{FrameContext, FrameStats, LatticeHooks, LatticeRenderer, SurfaceMaps};
pub use plan::GeometryPlan;
