use regex::Regex;
use std::fmt::Debug;

pub fn assert_re(pattern: &str, haystack: &str) {
    let re = Regex::new(pattern).unwrap();
    assert!(re.is_match(haystack),
            "{:?} did not match {:?}", haystack, re);
}

pub fn assert_vec_eq<T: PartialEq + Debug>(left: Vec<T>, right: Vec<T>) {
    assert_vecr_eq(&left, &right);
}

/// Like assert_eq, but reports which indices differ, which is far more
/// readable for long lists of large structs.
pub fn assert_vecr_eq<T: PartialEq + Debug>(left: &Vec<T>, right: &Vec<T>) {
    if left == right {
        return
    }

    if left.len() != right.len() {
        panic!("size of left ({}) != size of right ({}).\nleft: {:#?}\nright: {:#?}",
               left.len(), right.len(), left, right);
    }
    let mut mismatches = String::new();
    for (i, (l, r)) in left.iter().zip(right.iter()).enumerate() {
        if l != r {
            mismatches += &format!("Mismatch at index {}:\nleft: {:#?} != right: {:#?}\n",
                                   i, l, r);
        }
    }
    panic!("{}", mismatches);
}
