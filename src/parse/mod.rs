//! 解析管线：词法器、结构解析与错误位置恢复

pub mod parser;
pub mod recovery;
pub mod tokenizer;

pub use parser::JsonParseError;
pub use recovery::{recover, ErrorDetails};
pub use tokenizer::{Token, TokenError, Tokenizer};
