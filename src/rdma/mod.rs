//! RDMA functionalities.

pub mod cm;
pub mod status;

#[cfg(rdma_verbs)]
pub mod context;
#[cfg(rdma_verbs)]
pub mod cq;
#[cfg(rdma_verbs)]
pub mod mr;
#[cfg(rdma_verbs)]
pub mod pd;
#[cfg(rdma_verbs)]
pub mod qp;
