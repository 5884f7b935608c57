// Market data module entrypoint
pub mod adapters;         // quote-service clients and live transports (SSE, websocket)
pub mod feed;             // live snapshot subscription with polling fallback
pub mod normaliser;       // canonical / exchange-qualified symbols
pub mod types;            // wire and domain types
pub mod unified_snapshot; // merges per-exchange snapshots into one view
