//! Cross-module tests for the retrieval engine.
