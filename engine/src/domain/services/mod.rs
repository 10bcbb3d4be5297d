pub mod port_allocation;
pub mod supervision;

pub use port_allocation::PortAllocationService;
pub use supervision::BackendSupervisor;
