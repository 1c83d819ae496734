mod cogroup;
mod cross;
mod distinct;
mod filter;
mod foreach;
mod join;
mod limit;
mod load;
mod sort;
mod split;
mod store;
mod stream;
mod union;

pub use cogroup::CoGroup;
pub use cross::Cross;
pub use distinct::Distinct;
pub use filter::Filter;
pub use foreach::{ForEach, GenerateItem};
pub use join::{Join, JoinStrategy, JoinType};
pub use limit::Limit;
pub use load::{Load, RequiredMapKeys};
pub use sort::OrderBy;
pub use split::Split;
pub use store::Store;
pub use stream::Stream;
pub use union::Union;
