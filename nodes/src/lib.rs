// Image-generation nodes built on banana-core

// Credential resolution per invocation
pub mod backend;
pub use backend::{Backend, BackendProvider, EnvBackendProvider, StaticBackend};

// Inline citation rendering for grounded responses
pub mod citations;
pub use citations::{render_citations, render_grounding, try_render_citations, CitationSpan, Source};

// Pixel buffers and PNG encoding
pub mod codec;
pub use codec::{ImageCodec, PixelBuffer, PngCodec, PLACEHOLDER_SIZE};

// Node trait shared by every node
pub mod node;
pub use node::{Node, NodeOutput, CATEGORY};

// The nodes themselves
pub mod nodes;
pub use nodes::*;

// Input validation
pub mod options;
pub use options::GenerationOptions;

// Response interpretation
pub mod response;

// Registration metadata for hosts
pub mod registry;
pub use registry::{find_node, node_class_mappings, NodeDescriptor};

// Multi-turn conversation state
pub mod session;
pub use session::{ContentItem, ConversationState, InlineImage, Turn};
