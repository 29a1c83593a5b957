//! Sandboxed execution of generated JavaScript for blocklab.
//!
//! # Architecture
//!
//! - [`script`] -- Lexer, parser and tree-walking interpreter for the
//!   JavaScript subset the emitters produce
//! - [`realm`] -- The shared, frozen global environment and its fingerprint
//! - [`effects`] -- Capability bundle (`console`, `alert`, `prompt`) and the
//!   effect records it produces
//! - [`harness`] -- Runs one request against a realm and restores it
//! - [`report`] -- The [`ExecutionReport`] handed back to the caller
//!
//! # Usage
//!
//! ```ignore
//! use blocklab_core::LanguageKey;
//! use blocklab_exec::{Harness, HarnessConfig};
//!
//! let mut harness = Harness::new(HarnessConfig::default());
//! let report = harness.execute("console.log('hi'); 2 + 2", LanguageKey::JavaScript)?;
//! println!("{}", report.render());
//! ```

pub mod effects;
pub mod harness;
pub mod realm;
pub mod report;
pub mod script;

pub use effects::{EffectKind, EffectRecord};
pub use harness::{Harness, HarnessConfig, HarnessError, HarnessState};
pub use realm::{HostEffects, Realm, RealmFingerprint, TracingHost};
pub use report::{Completion, ExecutionReport, NotExecutable};
pub use script::Budget;
