//! Wire schema
//!
//! Checked-in protobuf bindings for the exchange message:
//!
//! ```text
//! message Message {
//!   message Wantlist {
//!     message Entry {
//!       bytes block = 1;    // CID in canonical binary form
//!       int32 priority = 2;
//!       bool cancel = 3;
//!     }
//!     repeated Entry entries = 1;
//!     bool full = 2;
//!   }
//!   Wantlist wantlist = 1;
//!   repeated bytes blocks = 2;
//! }
//! ```

/// One encoded exchange message
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Message {
    #[prost(message, optional, tag = "1")]
    pub wantlist: ::core::option::Option<message::Wantlist>,
    #[prost(bytes = "bytes", repeated, tag = "2")]
    pub blocks: ::prost::alloc::vec::Vec<::prost::bytes::Bytes>,
}

/// Nested message types of [`Message`]
pub mod message {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Wantlist {
        #[prost(message, repeated, tag = "1")]
        pub entries: ::prost::alloc::vec::Vec<wantlist::Entry>,
        /// Whether this is the sender's complete want-list
        #[prost(bool, tag = "2")]
        pub full: bool,
    }

    /// Nested message types of [`Wantlist`]
    pub mod wantlist {
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Entry {
            #[prost(bytes = "vec", tag = "1")]
            pub block: ::prost::alloc::vec::Vec<u8>,
            #[prost(int32, tag = "2")]
            pub priority: i32,
            #[prost(bool, tag = "3")]
            pub cancel: bool,
        }
    }
}
