//! Request handlers.

mod ask;
mod hyperedge;
mod process;

pub use ask::ask_query;
pub use hyperedge::{add_hyperedge, clear_hyperstructure, get_hyperstructure_data, root};
pub use process::{process_text, process_text_stream};
