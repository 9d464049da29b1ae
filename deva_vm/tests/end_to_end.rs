//! Hand-assembled bytecode programs exercising the six canonical
//! scenarios. No parser exists in this workspace, so each program is
//! built directly at the instruction level via `CodeBuilder`, the way
//! the VM's own unit tests would without a front end to lean on.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use deva_core::builder::CodeBuilder;
use deva_core::ids::LocalId;
use deva_core::opcode::Instr;
use deva_vm::Executor;

#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    fn text(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).unwrap()
    }
}

fn with_captured_output(ex: &mut Executor) -> SharedBuffer {
    let buf = SharedBuffer::default();
    ex.set_output(Box::new(buf.clone()));
    buf
}

#[test]
fn prints_the_sum_of_two_numbers() {
    // print(1 + 2);
    let mut cb = CodeBuilder::new();
    let one = cb.add_number(1.0);
    let two = cb.add_number(2.0);
    let mut main = cb.new_function("@main", 0, None);
    main.add_name("print");
    main.mark_line(1)
        .emit(Instr::LineNum(1))
        .emit(Instr::Push(one))
        .emit(Instr::Push(two))
        .emit(Instr::Add)
        .emit(Instr::Load(LocalId(0)))
        .emit(Instr::Call(1))
        .emit(Instr::Pop);
    cb.push_function(main);
    let code = cb.build();

    let mut ex = Executor::new(Rc::new(code), "scenario1").unwrap();
    let out = with_captured_output(&mut ex);
    ex.run().unwrap();
    assert_eq!(out.text(), "3\n");
}

#[test]
fn appends_to_a_vector_and_reports_its_length() {
    // v = [1, 2, 3]; append(v, 4); print(length(v));
    let mut cb = CodeBuilder::new();
    let nums: Vec<_> = (1..=4).map(|n| cb.add_number(n as f64)).collect();
    let mut main = cb.new_function("@main", 0, None);
    let v = LocalId(main.add_local()); // slot 0
    main.add_name("append"); // names[0] -> LocalId(1)
    main.add_name("print"); // names[1] -> LocalId(2)
    main.add_name("length"); // names[2] -> LocalId(3)
    let append_name = LocalId(1);
    let print_name = LocalId(2);
    let length_name = LocalId(3);

    main.emit(Instr::NewVec).emit(Instr::Store(v));
    for n in &nums {
        main.emit(Instr::Load(v))
            .emit(Instr::Push(*n))
            .emit(Instr::Load(append_name))
            .emit(Instr::Call(2))
            .emit(Instr::Pop);
    }
    main.emit(Instr::Load(v))
        .emit(Instr::Load(length_name))
        .emit(Instr::Call(1))
        .emit(Instr::Load(print_name))
        .emit(Instr::Call(1))
        .emit(Instr::Pop);
    cb.push_function(main);
    let code = cb.build();

    let mut ex = Executor::new(Rc::new(code), "scenario2").unwrap();
    let out = with_captured_output(&mut ex);
    ex.run().unwrap();
    assert_eq!(out.text(), "4\n");
    assert_eq!(ex.heaps().vectors.live_count(), 0, "no leaked vectors once @main returns");
}

#[test]
fn builds_a_map_and_reports_key_count() {
    // m = {"a":1}; m["b"] = 2; print(length(keys(m)));
    let mut cb = CodeBuilder::new();
    let key_a = cb.add_string("a");
    let key_b = cb.add_string("b");
    let one = cb.add_number(1.0);
    let two = cb.add_number(2.0);
    let mut main = cb.new_function("@main", 0, None);
    let m = LocalId(main.add_local());
    main.add_name("keys");
    main.add_name("length");
    main.add_name("print");
    let keys_name = LocalId(1);
    let length_name = LocalId(2);
    let print_name = LocalId(3);

    main.emit(Instr::NewMap)
        .emit(Instr::Store(m))
        .emit(Instr::Load(m))
        .emit(Instr::Push(key_a))
        .emit(Instr::Push(one))
        .emit(Instr::TblStore)
        .emit(Instr::Load(m))
        .emit(Instr::Push(key_b))
        .emit(Instr::Push(two))
        .emit(Instr::TblStore)
        .emit(Instr::Load(m))
        .emit(Instr::Load(keys_name))
        .emit(Instr::Call(1))
        .emit(Instr::Load(length_name))
        .emit(Instr::Call(1))
        .emit(Instr::Load(print_name))
        .emit(Instr::Call(1))
        .emit(Instr::Pop);
    cb.push_function(main);
    let code = cb.build();

    let mut ex = Executor::new(Rc::new(code), "scenario3").unwrap();
    let out = with_captured_output(&mut ex);
    ex.run().unwrap();
    assert_eq!(out.text(), "2\n");
    assert_eq!(ex.heaps().maps.live_count(), 0, "no leaked maps once @main returns");
}

#[test]
fn calls_a_user_function_and_prints_its_result() {
    // def f(x) { return x*x; } print(f(5));
    let mut cb = CodeBuilder::new();
    let five = cb.add_number(5.0);

    let mut f = cb.new_function("f", 1, None);
    f.emit(Instr::Load(LocalId(0)))
        .emit(Instr::Load(LocalId(0)))
        .emit(Instr::Mul)
        .emit(Instr::Return);
    let f_id = cb.push_function(f);

    let mut main = cb.new_function("@main", 0, None);
    main.add_name("f");
    main.add_name("print");
    let f_name = LocalId(0);
    let print_name = LocalId(1);
    main.emit(Instr::Push(five))
        .emit(Instr::Load(f_name))
        .emit(Instr::Call(1))
        .emit(Instr::Load(print_name))
        .emit(Instr::Call(1))
        .emit(Instr::Pop);
    let main_id = cb.push_function(main);
    cb.set_entry(main_id);
    let _ = f_id;
    let code = cb.build();

    let mut ex = Executor::new(Rc::new(code), "scenario4").unwrap();
    let out = with_captured_output(&mut ex);
    ex.run().unwrap();
    assert_eq!(out.text(), "25\n");
}

#[test]
fn builds_a_string_by_repeated_append() {
    // s = ""; for i in [1,2,3] { s = append(s, str(i)); } print(s);
    let mut cb = CodeBuilder::new();
    let empty = cb.add_string("");
    let nums: Vec<_> = (1..=3).map(|n| cb.add_number(n as f64)).collect();

    let mut main = cb.new_function("@main", 0, None);
    let s = LocalId(main.add_local());
    main.add_name("str");
    main.add_name("append");
    main.add_name("print");
    let str_name = LocalId(1);
    let append_name = LocalId(2);
    let print_name = LocalId(3);

    main.emit(Instr::Push(empty)).emit(Instr::Store(s));
    for n in &nums {
        main.emit(Instr::Load(s))
            .emit(Instr::Push(*n))
            .emit(Instr::Load(str_name))
            .emit(Instr::Call(1))
            .emit(Instr::Load(append_name))
            .emit(Instr::Call(2))
            .emit(Instr::Store(s));
    }
    main.emit(Instr::Load(s))
        .emit(Instr::Load(print_name))
        .emit(Instr::Call(1))
        .emit(Instr::Pop);
    cb.push_function(main);
    let code = cb.build();

    let mut ex = Executor::new(Rc::new(code), "scenario5").unwrap();
    let out = with_captured_output(&mut ex);
    ex.run().unwrap();
    assert_eq!(out.text(), "123\n");
}

#[test]
fn constructs_an_instance_and_reads_a_field_set_by_its_initializer() {
    // class C { def init(self, x) { self.x = x; } } c = new C(7); print(c.x);
    let mut cb = CodeBuilder::new();
    let key_x = cb.add_string("x");
    let seven = cb.add_number(7.0);
    let zero = cb.add_number(0.0);

    let mut init = cb.new_function("init", 2, Some("C".to_string()));
    init.emit(Instr::Load(LocalId(0))) // self
        .emit(Instr::Push(key_x))
        .emit(Instr::Load(LocalId(1))) // x
        .emit(Instr::TblStore)
        .emit(Instr::Push(zero))
        .emit(Instr::Return);
    cb.push_function(init);

    let mut main = cb.new_function("@main", 0, None);
    let class_slot = LocalId(main.add_local());
    let instance_slot = LocalId(main.add_local());
    main.add_name("init");
    main.add_name("print");
    let init_name = LocalId(2);
    let print_name = LocalId(3);

    main.emit(Instr::NewClass)
        .emit(Instr::Store(class_slot))
        .emit(Instr::Load(class_slot))
        .emit(Instr::NewInstance)
        .emit(Instr::Store(instance_slot))
        .emit(Instr::Load(instance_slot))
        .emit(Instr::Push(seven))
        .emit(Instr::Load(init_name))
        .emit(Instr::Call(2))
        .emit(Instr::Pop)
        .emit(Instr::Load(instance_slot))
        .emit(Instr::Push(key_x))
        .emit(Instr::TblLoad)
        .emit(Instr::Load(print_name))
        .emit(Instr::Call(1))
        .emit(Instr::Pop);
    cb.push_function(main);
    let code = cb.build();

    let mut ex = Executor::new(Rc::new(code), "scenario6").unwrap();
    let out = with_captured_output(&mut ex);
    ex.run().unwrap();
    assert_eq!(out.text(), "7\n");
}

#[test]
fn storing_a_class_into_a_named_variable_backfills_its_display_name() {
    // class C; print(C);
    let mut cb = CodeBuilder::new();
    let mut main = cb.new_function("@main", 0, None);
    let c = LocalId(main.add_named_local("C")); // slot 0
    main.add_name("print"); // names[0] -> LocalId(1)
    let print_name = LocalId(1);

    main.emit(Instr::NewClass)
        .emit(Instr::Store(c))
        .emit(Instr::Load(c))
        .emit(Instr::Load(print_name))
        .emit(Instr::Call(1))
        .emit(Instr::Pop);
    cb.push_function(main);
    let code = cb.build();

    let mut ex = Executor::new(Rc::new(code), "named_class").unwrap();
    let out = with_captured_output(&mut ex);
    ex.run().unwrap();
    assert_eq!(out.text(), "class: 'C' = {}\n");
}

#[test]
fn delete_clears_a_named_variables_binding_and_storage() {
    // x = 5; delete("x"); print(x);
    let mut cb = CodeBuilder::new();
    let five = cb.add_number(5.0);
    let x_name = cb.add_string("x");
    let mut main = cb.new_function("@main", 0, None);
    let x = LocalId(main.add_named_local("x")); // slot 0
    main.add_name("delete"); // names[0] -> LocalId(1)
    main.add_name("print"); // names[1] -> LocalId(2)
    let delete_name = LocalId(1);
    let print_name = LocalId(2);

    main.emit(Instr::Push(five))
        .emit(Instr::Store(x))
        .emit(Instr::Push(x_name))
        .emit(Instr::Load(delete_name))
        .emit(Instr::Call(1))
        .emit(Instr::Pop)
        .emit(Instr::Load(x))
        .emit(Instr::Load(print_name))
        .emit(Instr::Call(1))
        .emit(Instr::Pop);
    cb.push_function(main);
    let code = cb.build();

    let mut ex = Executor::new(Rc::new(code), "delete_named_var").unwrap();
    let out = with_captured_output(&mut ex);
    ex.run().unwrap();
    assert_eq!(out.text(), "null\n");
}
