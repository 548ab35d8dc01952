use dep_tree::parser::{JsLanguage, Language, PythonLanguage, RustLanguage};
use proptest::prelude::*;

fn languages() -> Vec<Box<dyn Language>> {
    vec![Box::new(JsLanguage::new()), Box::new(PythonLanguage::new(false)), Box::new(RustLanguage::new())]
}

fn ident() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,6}".prop_map(|s| format!("m_{s}"))
}

proptest! {
    #[test]
    fn extractors_never_panic_on_arbitrary_text(content in any::<String>()) {
        for lang in languages() {
            let _ = lang.extract(&content);
        }
    }

    #[test]
    fn extractors_never_panic_on_import_like_noise(
        content in r#"((import|from|export|use|mod|pub|\{|\}|\(|\)|'|"|;|,|\*|\.|\n| |#|//|/\*|\*/|as|a|b)){0,60}"#
    ) {
        for lang in languages() {
            let _ = lang.extract(&content);
        }
    }

    #[test]
    fn python_dotted_imports_keep_every_segment(paths in prop::collection::vec(prop::collection::vec(ident(), 1..4), 1..6)) {
        let src: String = paths.iter().map(|p| format!("import {}\n", p.join("."))).collect();
        let records = PythonLanguage::new(false).extract(&src).unwrap();
        let got: Vec<Vec<String>> = records.into_iter().map(|r| r.path).collect();
        prop_assert_eq!(got, paths);
    }

    #[test]
    fn js_relative_specifiers_count_parent_directories(ups in 0usize..4, segs in prop::collection::vec(ident(), 1..4)) {
        let prefix = if ups == 0 { "./".to_string() } else { "../".repeat(ups) };
        let src = format!("import x from '{prefix}{}';\n", segs.join("/"));
        let records = JsLanguage::new().extract(&src).unwrap();
        prop_assert_eq!(records.len(), 1);
        prop_assert_eq!(records[0].relative_depth, ups + 1);
        prop_assert_eq!(&records[0].path, &segs);
    }
}
