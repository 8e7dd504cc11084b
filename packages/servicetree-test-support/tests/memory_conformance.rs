use servicetree_core::MemoryStore;

#[test]
fn memory_store_passes_conformance() {
    servicetree_test_support::run_conformance_suite(MemoryStore::new);
}
