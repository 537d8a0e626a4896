//! Table definitions for the FAA releasable aircraft registry
//!
//! Column order matches the field order of each source file. FAA header
//! names are normalized to snake_case (`SERIAL NUMBER` -> `serial_number`).

use super::types::*;

// =============================================================================
// Reference tables (no dependencies)
// =============================================================================

pub static ACFTREF: TableSchema = TableSchema {
    name: "acftref",
    source_file: "ACFTREF.txt",
    columns: &[
        Column::key("code"),
        Column::text("mfr"),
        Column::text("model"),
        Column::text("type_acft"),
        Column::text("type_eng"),
        Column::text("ac_cat"),
        Column::text("build_cert_ind"),
        Column::text("no_eng"),
        Column::text("no_seats"),
        Column::text("ac_weight"),
        Column::text("speed"),
        Column::text("tc_data_sheet"),
        Column::text("tc_data_holder"),
    ],
    key: TableKey::Natural("code"),
    foreign_keys: &[],
    has_header: true,
};

pub static ENGINE: TableSchema = TableSchema {
    name: "engine",
    source_file: "ENGINE.txt",
    columns: &[
        Column::key("code"),
        Column::text("mfr"),
        Column::text("model"),
        Column::text("type"),
        Column::text("horsepower"),
        Column::text("thrust"),
    ],
    key: TableKey::Natural("code"),
    foreign_keys: &[],
    has_header: true,
};

// =============================================================================
// Registration tables
// =============================================================================

pub static MASTER: TableSchema = TableSchema {
    name: "master",
    source_file: "MASTER.txt",
    columns: &[
        Column::key("n_number"),
        Column::text("serial_number"),
        Column::lookup("mfr_mdl_code"),
        Column::lookup("eng_mfr_mdl"),
        Column::text("year_mfr"),
        Column::text("type_registrant"),
        Column::text("name"),
        Column::text("street"),
        Column::text("street2"),
        Column::text("city"),
        Column::text("state"),
        Column::text("zip_code"),
        Column::text("region"),
        Column::text("county"),
        Column::text("country"),
        Column::text("last_action_date"),
        Column::text("cert_issue_date"),
        Column::text("certification"),
        Column::text("type_aircraft"),
        Column::text("type_engine"),
        Column::text("status_code"),
        Column::text("mode_s_code"),
        Column::text("fract_owner"),
        Column::text("air_worth_date"),
        Column::text("other_names_1"),
        Column::text("other_names_2"),
        Column::text("other_names_3"),
        Column::text("other_names_4"),
        Column::text("other_names_5"),
        Column::text("expiration_date"),
        Column::text("unique_id"),
        Column::text("kit_mfr"),
        Column::text("kit_model"),
        Column::text("mode_s_code_hex"),
    ],
    key: TableKey::Natural("n_number"),
    foreign_keys: &[
        ForeignKey::hard("mfr_mdl_code", "acftref", "code"),
        ForeignKey::hard("eng_mfr_mdl", "engine", "code"),
    ],
    has_header: true,
};

pub static DEREG: TableSchema = TableSchema {
    name: "dereg",
    source_file: "DEREG.txt",
    columns: &[
        Column::lookup("n_number"),
        Column::text("serial_number"),
        Column::text("mfr_mdl_code"),
        Column::text("status_code"),
        Column::text("name"),
        Column::text("street_mail"),
        Column::text("street2_mail"),
        Column::text("city_mail"),
        Column::text("state_abbrev_mail"),
        Column::text("zip_code_mail"),
        Column::text("eng_mfr_mdl"),
        Column::text("year_mfr"),
        Column::text("certification"),
        Column::text("region"),
        Column::text("county_mail"),
        Column::text("country_mail"),
        Column::text("air_worth_date"),
        Column::text("cancel_date"),
        Column::text("mode_s_code"),
        Column::text("indicator_group"),
        Column::text("exp_country"),
        Column::text("last_act_date"),
        Column::text("cert_issue_date"),
        Column::text("street_physical"),
        Column::text("street2_physical"),
        Column::text("city_physical"),
        Column::text("state_abbrev_physical"),
        Column::text("zip_code_physical"),
        Column::text("county_physical"),
        Column::text("country_physical"),
        Column::text("other_names_1"),
        Column::text("other_names_2"),
        Column::text("other_names_3"),
        Column::text("other_names_4"),
        Column::text("other_names_5"),
        Column::text("kit_mfr"),
        Column::text("kit_model"),
        Column::text("mode_s_code_hex"),
    ],
    key: TableKey::Surrogate("id"),
    foreign_keys: &[ForeignKey::informational("n_number", "master", "n_number")],
    has_header: true,
};

pub static RESERVED: TableSchema = TableSchema {
    name: "reserved",
    source_file: "RESERVED.txt",
    columns: &[
        Column::key("n_number"),
        Column::text("registrant"),
        Column::text("street"),
        Column::text("street2"),
        Column::text("city"),
        Column::text("state"),
        Column::text("zip_code"),
        Column::text("rsv_date"),
        Column::text("tr"),
        Column::text("exp_date"),
        Column::text("n_num_chg"),
        Column::text("purge_date"),
    ],
    key: TableKey::Natural("n_number"),
    foreign_keys: &[ForeignKey::informational("n_number", "master", "n_number")],
    has_header: true,
};

pub static DEALER: TableSchema = TableSchema {
    name: "dealer",
    source_file: "DEALER.txt",
    columns: &[
        Column::key("certificate_number"),
        Column::text("ownership"),
        Column::text("certificate_date"),
        Column::text("expiration_date"),
        Column::text("expiration_flag"),
        Column::text("certificate_issue_count"),
        Column::text("name"),
        Column::text("street"),
        Column::text("street2"),
        Column::text("city"),
        Column::text("state_abbrev"),
        Column::text("zip_code"),
        Column::text("other_names_count"),
        Column::text("other_names_1"),
        Column::text("other_names_2"),
        Column::text("other_names_3"),
        Column::text("other_names_4"),
        Column::text("other_names_5"),
        Column::text("other_names_6"),
        Column::text("other_names_7"),
        Column::text("other_names_8"),
        Column::text("other_names_9"),
        Column::text("other_names_10"),
        Column::text("other_names_11"),
        Column::text("other_names_12"),
        Column::text("other_names_13"),
        Column::text("other_names_14"),
        Column::text("other_names_15"),
        Column::text("other_names_16"),
        Column::text("other_names_17"),
        Column::text("other_names_18"),
        Column::text("other_names_19"),
        Column::text("other_names_20"),
        Column::text("other_names_21"),
        Column::text("other_names_22"),
        Column::text("other_names_23"),
        Column::text("other_names_24"),
        Column::text("other_names_25"),
    ],
    key: TableKey::Natural("certificate_number"),
    foreign_keys: &[],
    has_header: true,
};

pub static DOCINDEX: TableSchema = TableSchema {
    name: "docindex",
    source_file: "DOCINDEX.txt",
    columns: &[
        Column::text("type_collateral"),
        Column::lookup("collateral"),
        Column::text("party"),
        Column::text("doc_id"),
        Column::text("drdate"),
        Column::text("processing_date"),
        Column::text("corr_date"),
        Column::text("corr_id"),
        Column::text("serial_id"),
        Column::text("doc_type"),
    ],
    key: TableKey::Surrogate("id"),
    foreign_keys: &[ForeignKey::informational("collateral", "master", "n_number")],
    has_header: true,
};

/// All registry tables in dependency order
pub static ALL_TABLES: &[&TableSchema] = &[
    // Reference data first
    &ACFTREF,
    &ENGINE,
    // Depends on both reference tables
    &MASTER,
    // Independent
    &DEREG,
    &RESERVED,
    &DEALER,
    &DOCINDEX,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_table_keys_an_existing_column() {
        for table in ALL_TABLES {
            assert!(
                !table.dedup_positions().is_empty(),
                "{} has no dedup column",
                table.name
            );
            if let TableKey::Natural(column) = table.key {
                assert!(table.column_names().contains(&column));
            }
        }
    }

    #[test]
    fn test_foreign_keys_point_at_known_tables() {
        for table in ALL_TABLES {
            for fk in table.foreign_keys {
                let parent = ALL_TABLES
                    .iter()
                    .find(|t| t.name == fk.references_table)
                    .expect("unknown parent table");
                assert!(parent.column_names().contains(&fk.references_column));
                assert!(table.column_names().contains(&fk.column));
            }
        }
    }

    #[test]
    fn test_column_counts_match_registry_layout() {
        assert_eq!(ACFTREF.columns.len(), 13);
        assert_eq!(ENGINE.columns.len(), 6);
        assert_eq!(MASTER.columns.len(), 34);
        assert_eq!(DEREG.columns.len(), 38);
        assert_eq!(RESERVED.columns.len(), 12);
        assert_eq!(DEALER.columns.len(), 38);
        assert_eq!(DOCINDEX.columns.len(), 10);
    }
}
