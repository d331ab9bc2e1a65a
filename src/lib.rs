//! promptloom - template resolution and generation-plan core for batch
//! image-prompt generation.
//!
//! Resolves a tree of inherited, imported, and themed YAML sources into a
//! single prompt template, then enumerates the weighted combinatorial
//! cross-product of its variations as a lazy sequence of fully rendered
//! backend requests.
//!
//! # Pipeline
//!
//! Six synchronous stages, each taking its input by value or
//! shared-immutable reference and returning a fresh structure:
//!
//! 1. [`loader`] - reads and classifies a YAML source.
//! 2. [`inherit`] - merges a `parent:` chain into one config.
//! 3. [`theme`] - overlays a named or explicit theme onto the import map.
//! 4. [`imports`] - resolves every placeholder's variation set and chunk.
//! 5. [`template`] - expands chunk directives and builds the placeholder
//!    plan.
//! 6. [`plan`] - enumerates the cross-product as `RenderedItem`s.
//!
//! [`pipeline`] wires the six stages into the three external-interface
//! operations (`load_and_resolve`, `apply_overrides`, `enumerate_plan`).
//! [`cli`] is a minimal demonstration of that boundary.
//!
//! # Modules
//!
//! - [`cli`] - command-line interface implementation.
//! - [`config`] - layered project/global/environment configuration.
//! - [`error`] - the closed `PromptloomError` taxonomy and `ErrorContext`.
//! - [`imports`] - stage 4, the import resolver.
//! - [`inherit`] - stage 2, the inheritance resolver.
//! - [`loader`] - stage 1, the source loader.
//! - [`pipeline`] - the three external-interface operations.
//! - [`plan`] - stage 6, the plan generator.
//! - [`rng`] - the single pseudorandom stream threaded through a plan.
//! - [`selector`] - the `[...]` selector grammar parser.
//! - [`template`] - stage 5, the template resolver.
//! - [`theme`] - stage 3, the theme overlay.
//! - [`types`] - the shared data model passed between stages.

pub mod cli;
pub mod config;
pub mod error;
pub mod imports;
pub mod inherit;
pub mod loader;
pub mod pipeline;
pub mod plan;
pub mod rng;
pub mod selector;
pub mod template;
pub mod theme;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
