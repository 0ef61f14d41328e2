#![no_main]

use arbitrary::Arbitrary;
use dockscan_scanner::{ScanRecipe, build_context};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct RecipeInput {
    image: String,
    scanner_image: String,
    build_tag: String,
}

fuzz_target!(|input: RecipeInput| {
    // 검증을 통과한 레시피는 줄 수가 고정되어야 함 (지시어 주입 불가)
    if let Ok(recipe) = ScanRecipe::new(&input.image, &input.scanner_image, &input.build_tag) {
        let rendered = recipe.render();
        let expected_lines = ScanRecipe::new("a", "b", "c")
            .map(|r| r.render().lines().count())
            .unwrap_or_default();
        assert_eq!(rendered.lines().count(), expected_lines);
        let _ = build_context(&recipe);
    }
});
