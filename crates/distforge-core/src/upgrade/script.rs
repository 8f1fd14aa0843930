//! Shell fragments that stand in for retired legacy features.
//!
//! A migrated script is an ordered list of fragments. Rendering puts the
//! interpreter line first and guarantees a trailing newline after every
//! fragment, so the output reads the same as if each piece had been appended
//! to the script by hand.

pub const SHEBANG: &str = "#!/bin/bash\n";

const IS_SNAPSHOT_START: &str =
    "### START: auto-generated back-compat code for \"IS_SNAPSHOT\" variable ###";

const IS_SNAPSHOT_PRELUDE: &str = r#"### START: auto-generated back-compat code for "IS_SNAPSHOT" variable ###
IS_SNAPSHOT=0
if [[ $VERSION =~ .+g[-+.]?[a-fA-F0-9]{3,}$ ]]; then IS_SNAPSHOT=1; fi
### END: auto-generated back-compat code for "IS_SNAPSHOT" variable ###
"#;

const BIN_INIT_SH: &str = r#"### START: auto-generated back-compat code for "omit-init-sh: false" behavior for bin dist ###
read -d '' DISTFORGE_UPGRADED_scriptContent <<"EOF"
#!/bin/bash
set -euo pipefail
BIN_DIR="$(cd "$(dirname "$0")" && pwd)"
# determine OS
OS=""
case "$(uname)" in
  Darwin*)
    OS=darwin
    ;;
  Linux*)
    OS=linux
    ;;
  *)
    echo "Unsupported operating system: $(uname)"
    exit 1
    ;;
esac
# determine executable location based on OS
CMD=$BIN_DIR/$OS-amd64/{{.ProductName}}
# verify that executable exists
if [ ! -e "$CMD" ]; then
    echo "Executable $CMD does not exist"
    exit 1
fi
# invoke appropriate executable
$CMD "$@"
EOF
DISTFORGE_UPGRADED_templated=${DISTFORGE_UPGRADED_scriptContent//\{\{.ProductName\}\}/$PRODUCT}
echo "$DISTFORGE_UPGRADED_templated" > "$DIST_WORK_DIR"/bin/"$PRODUCT".sh
chmod 755 "$DIST_WORK_DIR"/bin/"$PRODUCT".sh
### END: auto-generated back-compat code for "omit-init-sh: false" behavior for bin dist ###"#;

/// Start marker of the launcher fragment, for callers checking whether it was injected.
pub const BIN_INIT_SH_START: &str =
    "### START: auto-generated back-compat code for \"omit-init-sh: false\" behavior for bin dist ###";

pub const INPUT_DIR_START: &str =
    "### START: auto-generated back-compat code for \"input-dir\" behavior ###";

const INPUT_DIR_END: &str = "### END: auto-generated back-compat code for \"input-dir\" behavior ###";

/// Ordered script fragments for one migrated dister or docker builder.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScriptBuilder {
    fragments: Vec<String>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: impl Into<String>) -> &mut Self {
        self.fragments.push(fragment.into());
        self
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// `None` when nothing was pushed, so an untouched entry keeps no `script` key.
    pub fn render(&self) -> Option<String> {
        if self.fragments.is_empty() {
            return None;
        }
        let mut script = String::from(SHEBANG);
        for fragment in &self.fragments {
            script.push_str(fragment);
            if !script.ends_with('\n') {
                script.push('\n');
            }
        }
        Some(script)
    }
}

/// Launcher script generation that the legacy `bin` dist did when `omit-init-sh` was `false`.
pub fn bin_init_sh() -> &'static str {
    BIN_INIT_SH
}

/// Copies `input_dir` (relative to the project) into the dist work directory and drops `.gitkeep` files.
pub fn input_dir(input_dir: &str) -> String {
    format!(
        "{}\ncp -r \"$PROJECT_DIR\"/{}/. \"$DIST_WORK_DIR\"\nfind \"$DIST_WORK_DIR\" -type f -name .gitkeep -exec rm '{{}}' \\;\n{}",
        INPUT_DIR_START, input_dir, INPUT_DIR_END
    )
}

/// Rewrites legacy script text for the current environment.
///
/// `$DIST_DIR` and `${DIST_DIR}` become `$DIST_WORK_DIR` and `${DIST_WORK_DIR}`.
/// Longer names that merely start with `DIST_DIR` are left alone. Text that
/// mentions `IS_SNAPSHOT` gets a prelude computing it from `$VERSION`, unless
/// the prelude is already there.
pub fn translate_env_vars(input: &str) -> String {
    let output = if input.contains("IS_SNAPSHOT") && !input.contains(IS_SNAPSHOT_START) {
        format!("{}{}", IS_SNAPSHOT_PRELUDE, input)
    } else {
        input.to_string()
    };
    rename_var(&output, "DIST_DIR", "DIST_WORK_DIR")
}

fn rename_var(input: &str, old: &str, new: &str) -> String {
    let braced = input.replace(&format!("${{{}}}", old), &format!("${{{}}}", new));
    let bare_old = format!("${}", old);
    let bare_new = format!("${}", new);
    let mut output = String::with_capacity(braced.len());
    let mut rest = braced.as_str();
    while let Some(position) = rest.find(&bare_old) {
        let end = position + bare_old.len();
        let at_boundary = rest[end..]
            .chars()
            .next()
            .map_or(true, |next| !(next.is_ascii_alphanumeric() || next == '_'));
        output.push_str(&rest[..position]);
        output.push_str(if at_boundary { &bare_new } else { &bare_old });
        rest = &rest[end..];
    }
    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_builder_renders_nothing() {
        assert_eq!(ScriptBuilder::new().render(), None);
    }

    #[test]
    fn first_fragment_gets_shebang_and_newline() {
        let mut script = ScriptBuilder::new();
        script.push("echo one").push("echo two\n");
        assert_eq!(
            script.render().expect("script"),
            "#!/bin/bash\necho one\necho two\n"
        );
    }

    #[test]
    fn input_dir_fragment_matches_legacy_behavior() {
        assert_eq!(
            input_dir("resources/input"),
            concat!(
                "### START: auto-generated back-compat code for \"input-dir\" behavior ###\n",
                "cp -r \"$PROJECT_DIR\"/resources/input/. \"$DIST_WORK_DIR\"\n",
                "find \"$DIST_WORK_DIR\" -type f -name .gitkeep -exec rm '{}' \\;\n",
                "### END: auto-generated back-compat code for \"input-dir\" behavior ###",
            )
        );
    }

    #[test]
    fn launcher_fragment_is_delimited() {
        let fragment = bin_init_sh();
        assert!(fragment.starts_with(BIN_INIT_SH_START));
        assert!(fragment.ends_with(
            "### END: auto-generated back-compat code for \"omit-init-sh: false\" behavior for bin dist ###"
        ));
        assert!(fragment.contains("chmod 755 \"$DIST_WORK_DIR\"/bin/\"$PRODUCT\".sh"));
    }

    #[test]
    fn dist_dir_is_renamed_in_both_forms() {
        assert_eq!(
            translate_env_vars("cp a $DIST_DIR/a && ls ${DIST_DIR}/b"),
            "cp a $DIST_WORK_DIR/a && ls ${DIST_WORK_DIR}/b"
        );
    }

    #[test]
    fn longer_variable_names_are_untouched() {
        assert_eq!(
            translate_env_vars("echo $DIST_DIRECTORY $MY_DIST_DIR DIST_DIR"),
            "echo $DIST_DIRECTORY $MY_DIST_DIR DIST_DIR"
        );
    }

    #[test]
    fn snapshot_prelude_is_prepended_once() {
        let once = translate_env_vars("echo $IS_SNAPSHOT\n");
        assert!(once.starts_with(IS_SNAPSHOT_START));
        assert!(once.ends_with("echo $IS_SNAPSHOT\n"));
        assert_eq!(translate_env_vars(&once), once);
    }

    #[test]
    fn text_without_snapshot_reference_gets_no_prelude() {
        assert_eq!(translate_env_vars("echo hi"), "echo hi");
    }

    proptest! {
        #[test]
        fn rendered_script_ends_with_newline_and_keeps_fragments(
            fragments in proptest::collection::vec("[a-z ]{0,12}\n?", 1..6)
        ) {
            let mut builder = ScriptBuilder::new();
            for fragment in &fragments {
                builder.push(fragment.clone());
            }
            let script = builder.render().expect("script");
            prop_assert!(script.starts_with(SHEBANG));
            prop_assert!(script.ends_with('\n'));
            let mut rest = &script[SHEBANG.len()..];
            for fragment in &fragments {
                prop_assert!(rest.starts_with(fragment.as_str()));
                rest = &rest[fragment.len()..];
                if !fragment.ends_with('\n') {
                    prop_assert!(rest.starts_with('\n'));
                    rest = &rest[1..];
                }
            }
            prop_assert!(rest.is_empty());
        }

        #[test]
        fn rewrite_only_touches_dist_dir_references(text in "[a-zA-Z_ ${}/]{0,40}") {
            let rewritten = translate_env_vars(&text);
            if !text.contains("IS_SNAPSHOT") {
                let restored = rewritten
                    .replace("${DIST_WORK_DIR}", "${DIST_DIR}")
                    .replace("$DIST_WORK_DIR", "$DIST_DIR");
                prop_assert_eq!(restored, text.clone());
            }
        }
    }
}
