mod correlation;

pub use correlation::{
    CorrelationId,
    CorrelationIdMiddlewareFactory,
    CorrelationIdMiddlewareService,
    CORRELATION_ID_HEADER,
};
