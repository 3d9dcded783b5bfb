pub mod indexed_heap;
pub mod key_chain;
pub mod sum_tree;
pub mod xorshift;

pub use indexed_heap::{HeapOrder, IndexedHeap};
pub use key_chain::KeyChain;
pub use sum_tree::SumTree;
pub use xorshift::XorShift64;
