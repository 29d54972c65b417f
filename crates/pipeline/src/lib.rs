//! The FinTrack chat pipeline.
//!
//! A message travels: validate → extract and persist any uploaded statement →
//! assemble the model context → call the model → apply the first-turn chat
//! name → append user and assistant messages in one commit.
//!
//! [`ChatService`] drives that sequence; every other module is a single step
//! that can be exercised on its own.

pub mod assembler;
pub mod extractor;
pub mod locks;
pub mod model_gateway;
pub mod naming;
pub mod service;

pub use assembler::{AssembledContext, AssemblyInput, assemble};
pub use extractor::PdfExtractor;
pub use locks::ChatLocks;
pub use model_gateway::ModelGateway;
pub use naming::{ChatName, extract_chat_name};
pub use service::{ChatService, SendMessage};
