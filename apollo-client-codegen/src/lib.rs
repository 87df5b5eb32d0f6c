//! Schema-driven renderers for a GraphQL code generator's enum and
//! fragment/selection-set declarations.
//!
//! Both renderers are pure functions over a small, hand-rollable IR plus a
//! [`config::CodegenConfig`] — neither depends on a real GraphQL schema
//! parser, treating `GraphQLCompiler`/`IR` as external collaborators.
//! `apollo-client-core` is the sibling crate consuming the generated code's
//! runtime contracts (`DataDict`, `CacheKey`, selection-set execution);
//! this crate produces only the source text.

pub mod casing;
pub mod config;
pub mod enum_renderer;
pub mod fragment;
pub mod reserved;

pub use config::CodegenConfig;
pub use enum_renderer::{render_enum, EnumInput, EnumValueInput};
pub use fragment::{render_fragment, FragmentIr};
