pub mod address_service;
pub mod index_allocator;

pub use address_service::{AddressRequest, AddressService, IssuedAddress};
pub use index_allocator::{Allocation, IndexAllocator, Reservation, RetryPolicy};
