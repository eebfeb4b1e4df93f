pub mod annotation;
pub mod app;
pub mod classify;
pub mod config;
pub mod domain;
pub mod download;
pub mod error;
pub mod fasta;
pub mod filter;
pub mod harvester;
pub mod metadata;
pub mod ncbi;
pub mod output;
pub mod resolver;
pub mod serialize;
