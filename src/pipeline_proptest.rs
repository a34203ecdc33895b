//! Property-based tests for output planning and the orphan sweep.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use std::collections::BTreeSet;
    use std::path::{Path, PathBuf};

    use crate::config::SiteConfig;
    use crate::phases::layout::Layout;
    use crate::phases::sweep::{ancestors, orphans};
    use proptest::prelude::*;

    fn layout(index_only: bool) -> Layout {
        let mut config = SiteConfig::new("my-site.net");
        config.content.index_only = index_only;
        Layout::from_config(&config).unwrap()
    }

    fn id_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-z0-9][a-z0-9 _-]{0,8}", 1..4)
            .prop_map(|parts: Vec<String>| parts.join("/"))
    }

    fn path_set() -> impl Strategy<Value = BTreeSet<PathBuf>> {
        prop::collection::btree_set(
            prop::collection::vec("[a-c]", 1..4)
                .prop_map(|parts: Vec<String>| parts.iter().collect::<PathBuf>()),
            0..12,
        )
    }

    // ============================================================================
    // Layout property tests
    // ============================================================================

    proptest! {
        /// Property: every planned file lives below the id's folders
        #[test]
        fn plan_stays_below_id(id in id_strategy(), lang in "[a-z]{2}", index_only in any::<bool>()) {
            let layout = layout(index_only);
            let plan = layout.plan(&id, &lang).unwrap();

            let shared = layout.shared_folder(&id);
            prop_assert!(plan.file.starts_with(&shared));
            prop_assert!(plan.file.starts_with(&plan.folder));
            prop_assert!(plan.file.is_relative());
        }

        /// Property: URLs are rooted and free of spaces
        #[test]
        fn plan_url_is_rooted(id in id_strategy(), lang in "[a-z]{2}", index_only in any::<bool>()) {
            let plan = layout(index_only).plan(&id, &lang).unwrap();
            prop_assert!(plan.url.starts_with('/'));
            prop_assert!(!plan.url.contains(' '));
        }

        /// Property: different languages of one id never share a file
        #[test]
        fn plan_languages_do_not_collide(id in id_strategy(), index_only in any::<bool>()) {
            let layout = layout(index_only);
            let en = layout.plan(&id, "en").unwrap();
            let de = layout.plan(&id, "de").unwrap();
            prop_assert_ne!(en.file, de.file);
            prop_assert_ne!(en.url, de.url);
        }
    }

    // ============================================================================
    // Sweep property tests
    // ============================================================================

    proptest! {
        /// Property: orphans come from the snapshot and never include what
        /// was touched or a folder holding it
        #[test]
        fn orphans_spare_touched_paths(before in path_set(), touched in path_set()) {
            let found = orphans(&before, &touched, &[]);
            let parents = ancestors(&touched);

            for path in &found {
                prop_assert!(before.contains(path));
                prop_assert!(!touched.contains(path));
                prop_assert!(!parents.contains(path));
            }
        }

        /// Property: nothing inside a static dir is ever an orphan
        #[test]
        fn orphans_spare_static_dirs(before in path_set(), touched in path_set()) {
            let static_dirs = vec![PathBuf::from("a")];
            let found = orphans(&before, &touched, &static_dirs);
            prop_assert!(found.iter().all(|path| !path.starts_with(Path::new("a"))));
        }

        /// Property: touching everything leaves no orphans
        #[test]
        fn orphans_empty_when_all_touched(before in path_set()) {
            prop_assert!(orphans(&before, &before, &[]).is_empty());
        }
    }
}
