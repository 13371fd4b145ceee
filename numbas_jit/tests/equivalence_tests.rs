//! Property tests: a specialization computes what the generic method does.

use numbas_jit::{Jit, JitConfig, JitOptions, Proxy};
use numbas_runtime::{Class, Object, Scope, Value};
use proptest::prelude::*;
use std::sync::Arc;

const INT_METHOD: &str = "
    def f(self, n):
        if n > self.c:
            acc = self.a * n + self.b
        else:
            acc = self.a - n // (self.b + 1000)
        for i in range(self.steps):
            acc = (acc + i * self.a) % 1000003
        return acc, abs(n - self.c) < 10 and self.b or -self.b
";

const FLOAT_METHOD: &str = "
    def g(self, x):
        y = self.scale * math.sin(x) + self.shift
        if not math.isnan(y) and y > self.limit:
            y = self.limit
        return max(y, -self.limit) ** 2
";

fn install(source: &str, name: &str) -> (Arc<Class>, Arc<Proxy>) {
    let class = Class::new("Subject", Scope::new("props"));
    let jit = Jit::default().with_config(JitConfig::default());
    let proxy = jit.specialize(&class, source, JitOptions::new()).unwrap();
    assert_eq!(proxy.name(), name);
    (class, proxy)
}

fn int_subject(class: &Arc<Class>, a: i64, b: i64, c: i64, steps: i64) -> Arc<Object> {
    class.instantiate([
        ("a", Value::Int(a)),
        ("b", Value::Int(b)),
        ("c", Value::Int(c)),
        ("steps", Value::Int(steps)),
    ])
}

proptest! {
    #[test]
    fn prop_int_specialization_matches_generic(
        a in -1000i64..1000,
        b in -500i64..500,
        c in -100i64..100,
        steps in 0i64..20,
        ns in prop::collection::vec(-1000i64..1000, 1..8),
    ) {
        let (class, proxy) = install(INT_METHOD, "f");
        let obj = int_subject(&class, a, b, c, steps);
        for n in ns {
            let args = [Value::Int(n)];
            let specialized = obj.call_method("f", &args).unwrap();
            let generic = proxy.call_generic(&obj, &args).unwrap();
            prop_assert_eq!(specialized, generic);
        }
    }

    #[test]
    fn prop_float_specialization_matches_generic(
        scale in -10.0f64..10.0,
        shift in -5.0f64..5.0,
        limit in 0.1f64..8.0,
        xs in prop::collection::vec(-100.0f64..100.0, 1..8),
    ) {
        let (class, proxy) = install(FLOAT_METHOD, "g");
        let obj = class.instantiate([
            ("scale", Value::Float(scale)),
            ("shift", Value::Float(shift)),
            ("limit", Value::Float(limit)),
        ]);
        for x in xs {
            let args = [Value::Float(x)];
            let specialized = obj.call_method("g", &args).unwrap();
            let generic = proxy.call_generic(&obj, &args).unwrap();
            prop_assert!(specialized.is_same(&generic), "{} != {}", specialized, generic);
        }
    }

    #[test]
    fn prop_reset_tracks_current_state(
        before in -1000i64..1000,
        after in -1000i64..1000,
        n in -1000i64..1000,
    ) {
        let (class, proxy) = install(INT_METHOD, "f");
        let obj = int_subject(&class, before, 1, 0, 3);
        let args = [Value::Int(n)];
        let stale = obj.call_method("f", &args).unwrap();

        obj.set_attr("a", Value::Int(after));
        prop_assert_eq!(obj.call_method("f", &args).unwrap(), stale);

        numbas_jit::introspect::reset(&obj.get_attr("f").unwrap()).unwrap();
        let fresh = obj.call_method("f", &args).unwrap();
        prop_assert_eq!(fresh, proxy.call_generic(&obj, &args).unwrap());
    }
}
