/// Column-name constants for the surveillance tables.
/// Single source of truth - also exported to Python when the `python` feature is on.

// ── Raw metadata columns ────────────────────────────────────────────────────
pub mod metadata {
    pub const VIRUS_NAME: &str = "Virus name";
    pub const TYPE: &str = "Type";
    pub const ACCESSION_ID: &str = "Accession ID";
    pub const COLLECTION_DATE: &str = "Collection date";
    pub const LOCATION: &str = "Location";
    pub const ADDITIONAL_LOCATION: &str = "Additional location information";
    pub const SEQUENCE_LENGTH: &str = "Sequence length";
    pub const HOST: &str = "Host";
    pub const PATIENT_AGE: &str = "Patient age";
    pub const GENDER: &str = "Gender";
    pub const CLADE: &str = "Clade";
    pub const PANGO_LINEAGE: &str = "Pango lineage";
    pub const PANGOLIN_VERSION: &str = "Pangolin version";
    pub const VARIANT: &str = "Variant";
    pub const AA_SUBSTITUTIONS: &str = "AA Substitutions";
    pub const SUBMISSION_DATE: &str = "Submission date";
    pub const IS_REFERENCE: &str = "Is reference?";
    pub const IS_COMPLETE: &str = "Is complete?";
    pub const IS_HIGH_COVERAGE: &str = "Is high coverage?";
    pub const IS_LOW_COVERAGE: &str = "Is low coverage?";
    pub const N_CONTENT: &str = "N-Content";
    pub const GC_CONTENT: &str = "GC-Content";

    /// Tracked metadata fields, in file order.
    pub const ALL: [&str; 22] = [
        VIRUS_NAME,
        TYPE,
        ACCESSION_ID,
        COLLECTION_DATE,
        LOCATION,
        ADDITIONAL_LOCATION,
        SEQUENCE_LENGTH,
        HOST,
        PATIENT_AGE,
        GENDER,
        CLADE,
        PANGO_LINEAGE,
        PANGOLIN_VERSION,
        VARIANT,
        AA_SUBSTITUTIONS,
        SUBMISSION_DATE,
        IS_REFERENCE,
        IS_COMPLETE,
        IS_HIGH_COVERAGE,
        IS_LOW_COVERAGE,
        N_CONTENT,
        GC_CONTENT,
    ];

    pub const HUMAN_HOST: &str = "Human";
}

// ── Columns added by normalization ──────────────────────────────────────────
pub mod derived {
    pub const COUNTRY: &str = "Country";
    pub const REGION: &str = "Region";
    pub const WEEK: &str = "Week";
    pub const OTHER_VARIANTS: &str = "Other_variants";
    pub const TOTAL: &str = "Total";
    pub const AGE_LOWER: &str = "Patient age lower";
    pub const AGE_UPPER: &str = "Patient age upper";
    pub const AGE_GROUP: &str = "Age group";
}

// ── Completeness table ──────────────────────────────────────────────────────
pub mod completeness {
    pub const COUNTRY: &str = "Country";
    pub const N: &str = "N";
}

// ── Vaccination columns ─────────────────────────────────────────────────────
pub mod vaccination {
    /// Source file columns.
    pub const DATE: &str = "date";
    pub const ISO_CODE: &str = "iso_code";
    pub const PEOPLE_VACCINATED: &str = "people_vaccinated";
    pub const PEOPLE_FULLY_VACCINATED: &str = "people_fully_vaccinated";
    pub const TOTAL_BOOSTERS: &str = "total_boosters";

    pub const COUNTS: [&str; 3] = [PEOPLE_VACCINATED, PEOPLE_FULLY_VACCINATED, TOTAL_BOOSTERS];
}

// ── Dominance window table ──────────────────────────────────────────────────
pub mod dominance {
    pub const COUNTRY: &str = "Country";
    pub const VARIANT: &str = "Variant";
    pub const START_WEEK: &str = "Start week";
    pub const END_WEEK: &str = "End week";
    pub const THRESHOLD: &str = "Threshold";
}

// ── Correlation report ──────────────────────────────────────────────────────
pub mod correlation {
    pub const RATIO: &str = "ratio";
}
