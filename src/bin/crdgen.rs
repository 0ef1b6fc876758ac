//! CRD YAML Generator
//!
//! Prints the Kubernetes CRD manifests of the custom resources read by the
//! restore finalizer operator.
//!
//! Usage: cargo run --bin crdgen > deploy/crds/all.yaml

use restore_finalizer_operator::crd::generate_crds;

fn main() {
    for crd in generate_crds() {
        println!("---");
        print!("{}", crd);
    }
}
