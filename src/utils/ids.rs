#![allow(unused)]

macro_rules! id_gen {
    ($module_name:ident) => {
        mod $module_name {
            static NEXT: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);
            lazy_static::lazy_static! {
                static ref IN_USE: std::sync::Mutex<std::collections::HashSet<usize>> =
                    std::sync::Mutex::new(std::collections::HashSet::new());
            }

            pub(crate) fn next() -> usize {
                let mut ids = IN_USE.lock().unwrap();
                if ids.len() == usize::MAX {
                    panic!("Out of ids");
                }

                let id = loop {
                    let new_id = NEXT.fetch_update(
                        std::sync::atomic::Ordering::SeqCst,
                        std::sync::atomic::Ordering::SeqCst,
                        |mut id| {
                            while ids.iter().any(|k| *k == id) {
                                id += 1;
                            }
                            id += 1;
                            Some(id)
                        },
                    );
                    if let Ok(id) = new_id {
                        break id;
                    }
                };

                ids.insert(id);
                id
            }

            pub(crate) fn remove(id: usize) {
                IN_USE.lock().unwrap().remove(&id);
            }
        }
    };
}

pub(crate) use id_gen;
