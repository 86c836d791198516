//! # Targeting Harness
//!
//! Feature discovery and audience segmentation for marketing campaigns.
//!
//! A fixed catalog of targeting features is synthesized at startup, embedded,
//! and held in an in-memory similarity index. A campaign request (product,
//! success metric, audience size, send frequency) is matched against that
//! index, each hit is justified from the feature's own metadata, and the
//! audience is then split into one segment per send with an equal volume
//! and a scheduled date.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌──────────────┐
//! │ Catalog  │──▶│ Embedding │──▶│ FeatureIndex │
//! │ 75 items │   │ provider  │   │ exact L2     │
//! └──────────┘   └───────────┘   └──────┬───────┘
//!                                       │
//!                   ┌───────────────────┤
//!                   ▼                   ▼
//!           ┌───────────────┐   ┌──────────────┐
//!           │ Retrieval and │──▶│ Segmentation │◀── SegmentGenerator
//!           │ justification │   │ and fallback │    (LLM or disabled)
//!           └───────┬───────┘   └──────┬───────┘
//!                   └─────────┬────────┘
//!                             ▼
//!                   ┌──────────────────┐
//!                   │ CLI (tgt) / HTTP │
//!                   └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types and the validated campaign request |
//! | [`error`] | Domain error taxonomy |
//! | [`catalog`] | Feature catalog synthesis |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Exact nearest-neighbour similarity index |
//! | [`retrieval`] | Ranked retrieval with justifications |
//! | [`generation`] | Generative segment providers |
//! | [`segmentation`] | Quota allocation, scheduling, and fallback |
//! | [`engine`] | Process bootstrap |
//! | [`session`] | Planning session state machine |
//! | [`server`] | JSON HTTP API |

pub mod catalog;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod generation;
pub mod index;
pub mod models;
pub mod retrieval;
pub mod segmentation;
pub mod server;
pub mod session;
