//! Environment Integration Test Suite
//!
//! Runs the propagation harness against a live cluster: a Kubernetes API
//! server, an ingress controller acting as the proxy, and an httpbin-style
//! backend service.
//!
//! # Features
//!
//! - `smoke`: Proxy and backend reachability checks (30s)
//! - `perf`: Full batch submission and propagation measurement (minutes)
//! - `all`: Enable all test categories
//!
//! # Prerequisites
//!
//! 1. Cluster running with the ingress controller and backend deployed
//! 2. `PERF_PROXY_URL` pointing at the proxy (port-forward or load balancer)
//! 3. kubectl in PATH, or `PERF_KUBECTL` set
//!
//! # Usage
//!
//! ```bash
//! # From repo root - runs 0 env-tests (no default features)
//! cargo test
//!
//! # Smoke tests only
//! PERF_PROXY_URL=http://localhost:8000 cargo test -p env-tests --features smoke
//!
//! # Full propagation run
//! PERF_PROXY_URL=http://localhost:8000 cargo test -p env-tests --features perf -- --nocapture
//! ```

pub mod cluster;
