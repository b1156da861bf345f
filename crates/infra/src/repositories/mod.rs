mod memory;

pub use memory::{
    InMemoryListingDirectory, InMemoryMessageLedger, InMemoryNotificationLedger,
    InMemoryUserDirectory,
};
