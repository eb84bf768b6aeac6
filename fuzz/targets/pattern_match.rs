#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use zsub::{matches, Pattern, Subject};

#[derive(Debug, Arbitrary)]
struct MatchInput {
    subject: String,
    pattern: String,
}

fuzz_target!(|input: MatchInput| {
    // Разбор не должен паниковать ни на каком входе
    let subject = Subject::parse(&input.subject);
    let pattern = Pattern::parse(&input.pattern);

    if let Ok(pattern) = &pattern {
        assert_eq!(pattern.as_str(), input.pattern);
        // Литеральный шаблон обязан совпадать с тем же subject
        if pattern.is_literal() {
            let same = Subject::parse(pattern.as_str()).expect("literal pattern is a valid subject");
            assert!(matches(&same, pattern));
        }
    }

    if let (Ok(subject), Ok(pattern)) = (subject, pattern) {
        let _ = matches(&subject, &pattern);
    }
});
