#[macro_export]
macro_rules! assert_cleaned {
    (
        $(
            $test_name:ident : html => $html:expr, result => $result:expr
        ),+ $(,)?
    ) => {
        $(
            #[test]
            fn $test_name() {
                let result = scriptbook::preprocess::clean_html($html);

                assert_that(&result).is_equal_to($result.to_owned());
            }
        )+
    }
}
