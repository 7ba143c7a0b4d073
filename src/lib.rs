//! # Scriptorium
//!
//! A resumable content pipeline that turns a scraped creator profile into a
//! scheduled calendar of ready-to-film scripts.
//!
//! Scriptorium ingests a creator's posts and transcripts, indexes them into a
//! local SQLite vector store, plans a pillar-balanced content calendar
//! grounded in retrieved niche context, writes a full script for every
//! planned post, and compiles the result into a single reviewable document.
//! State is checkpointed after every stage, so a stopped or failed run can be
//! resumed from its last completed stage without repeating work.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Extraction  │──▶│   Indexing   │──▶│   Strategy   │
//! │  (scraped    │   │ chunk+embed  │   │ calendar of  │
//! │   profile)   │   │ into SQLite  │   │   briefs     │
//! └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                              │
//!                    ┌──────────────┐   ┌──────▼───────┐
//!                    │  Compilation │◀──│    Writer    │
//!                    │  (markdown)  │   │ one script   │
//!                    │              │   │  per brief   │
//!                    └──────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! scrib init                                   # create database
//! scrib run https://youtube.com/@creator \
//!     --items ./scraped/creator.json           # full pipeline run
//! scrib status                                 # list threads
//! scrib resume youtube_creator_20250301093000  # continue a stopped run
//! scrib search youtube_creator "hook patterns"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`chunk`] | Word-budget text chunking |
//! | [`parse`] | Layered JSON extraction from model output |
//! | [`extraction`] | Platform detection and profile extraction providers |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`generation`] | Text generation provider abstraction |
//! | [`vector`] | Vector store over SQLite |
//! | [`indexer`] | Indexing stage |
//! | [`retrieval`] | Niche context aggregation |
//! | [`strategist`] | Calendar planning stage |
//! | [`writer`] | Script writing stage |
//! | [`compiler`] | Document rendering stage |
//! | [`pipeline`] | Checkpointed stage driver |
//! | [`checkpoint`] | Thread state persistence |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod checkpoint;
pub mod chunk;
pub mod compiler;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extraction;
pub mod generation;
pub mod indexer;
pub mod migrate;
pub mod models;
pub mod parse;
pub mod pipeline;
pub mod retrieval;
pub mod run;
pub mod state;
pub mod strategist;
pub mod vector;
pub mod writer;

pub use error::{PipelineError, Result};
