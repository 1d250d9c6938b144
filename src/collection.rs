//! Collection naming for the document store

/// Name of the collection a client's documents are loaded into
///
/// No sanitizing is applied: a `/` inside either part is kept as-is.
///
/// ```
/// assert_eq!(bulk_load::collection_name("C001", "Acme"), "C001/Acme-DB");
/// ```
pub fn collection_name(client_id: &str, business_name: &str) -> String {
    format!("{client_id}/{business_name}-DB")
}
