//! # paygate-core
//!
//! Payment backend registry, callback ingestion, and the payment error
//! taxonomy.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    CallbackIngestor                          │
//! │  ┌──────────────┐  ┌───────────────┐  ┌──────────────────┐   │
//! │  │  Payment     │  │  PaymentFlow  │  │  RetryStore      │   │
//! │  │  Repository  │──│  (delegate)   │──│  (on transient   │   │
//! │  │              │  │               │  │   failure)       │   │
//! │  └──────────────┘  └───────┬───────┘  └──────────────────┘   │
//! └────────────────────────────│─────────────────────────────────┘
//!                      ┌───────┴──────────┐
//!                      │ ProcessorRegistry│  slug → Processor
//!                      │  (per backend)   │
//!                      └──────────────────┘
//! ```
//!
//! The `PaymentFlow` trait is the boundary to the component owning
//! payment lifecycle logic; `ProcessorFlow` is the bundled
//! implementation over the registry. Failures classify into the closed
//! [`PaymentError`] taxonomy with fixed wire codes and HTTP statuses.

pub mod callback;
pub mod config;
pub mod dummy;
pub mod error;
pub mod flow;
pub mod payment;
pub mod processor;
pub mod registry;

pub use callback::{CallbackIngestor, CallbackOutcome};
pub use config::PaygateConfig;
pub use dummy::{DummyPlugin, DummyProcessor};
pub use error::{ErrorBody, PaymentError, Result};
pub use flow::{PaymentFlow, ProcessorFlow};
pub use payment::{
    MemoryPaymentRepository, NewPayment, Order, OrderResolver, Payment, PaymentId,
    PaymentRepository,
};
pub use processor::{Processor, ProcessorDescriptor, ProcessorPlugin, TransactionResult};
pub use registry::{DiscoverySummary, ProcessorRegistry};
