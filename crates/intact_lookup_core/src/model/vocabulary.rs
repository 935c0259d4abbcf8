//! Well-known PSI-MI vocabulary constants.
//!
//! Values must stay byte-identical to the curated reference data: lookups
//! compare them against stored short names and identifiers.

/// Short name of the PSI-MI ontology database concept.
pub const PSI_MI: &str = "psi-mi";
/// Ontology id of the PSI-MI database concept.
pub const PSI_MI_MI: &str = "MI:0488";
/// Identifier prefix used by PSI-MI terms.
pub const PSI_MI_PREFIX: &str = "MI";

/// Qualifier marking the primary identifier of a term.
pub const IDENTITY: &str = "identity";
pub const IDENTITY_MI: &str = "MI:0356";
/// Qualifier marking a retired/secondary identifier of a term.
pub const SECONDARY: &str = "secondary-ac";
pub const SECONDARY_MI: &str = "MI:0360";
/// Qualifier marking the primary literature reference of a publication.
pub const PRIMARY_REFERENCE: &str = "primary-reference";
pub const PRIMARY_REFERENCE_MI: &str = "MI:0358";

pub const PUBMED: &str = "pubmed";
pub const PUBMED_MI: &str = "MI:0446";
pub const DOI: &str = "doi";
pub const DOI_MI: &str = "MI:0574";
pub const IMEX: &str = "imex";
pub const IMEX_MI: &str = "MI:0670";
pub const IMEX_PRIMARY: &str = "imex-primary";
pub const IMEX_PRIMARY_MI: &str = "MI:0662";

/// Qualifier short names accepted when resolving a term by ontology id.
pub const ONTOLOGY_ID_QUALIFIERS: [&str; 2] = [IDENTITY, SECONDARY];

/// Returns whether `short_name` qualifies an xref as an ontology identifier.
pub fn is_ontology_id_qualifier(short_name: &str) -> bool {
    ONTOLOGY_ID_QUALIFIERS.contains(&short_name)
}
