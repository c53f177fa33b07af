pub mod sequence;
pub mod user;

pub use sequence::PostgresSequenceAllocator;
pub use user::PostgresUserRepository;
