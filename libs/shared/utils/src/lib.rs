pub mod extractor;
pub mod password;
pub mod slug;
pub mod test_utils;
pub mod token;
pub mod validation;
